//! Core traits for the DHCP sync system
//!
//! - [`IdentityStore`]: Read-only access to the IP address inventory
//! - [`TargetStore`]: Persistent DHCP/DNS server records
//! - [`PushTransport`]: Delivery of entries to a DHCP server

pub mod identity_store;
pub mod push_transport;
pub mod target_store;

pub use identity_store::{IdentityStore, IdentityStoreFactory};
pub use push_transport::{PushTransport, PushTransportFactory};
pub use target_store::{TargetStore, TargetStoreFactory};
