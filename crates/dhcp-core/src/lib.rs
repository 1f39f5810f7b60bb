// # dhcp-core
//
// Core library for DHCP entry eligibility and sync-target bookkeeping.
//
// ## Architecture Overview
//
// - **IdentityStore**: Read-only access to IP address records and their interfaces
// - **TargetStore**: Persistent storage for DHCP and DNS server records
// - **PushTransport**: Delivers the eligible entry set to one DHCP server
// - **EligibilityFilter**: Derives exportable DHCP entries from the identity store
// - **SyncTargetRegistry**: Uniqueness-checked registration and timestamp write-back
// - **SyncCoordinator**: Pushes entries to every DHCP server and records successes
// - **ComponentRegistry**: Plugin-based construction of stores and transports
//
// ## Data Flow
//
// IdentityStore → EligibilityFilter → SyncCoordinator → SyncTargetRegistry
//
// The identity store is never written to. The only mutation the coordinator
// performs is the `last_synchronized` write-back after a confirmed push.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod eligibility;
pub mod error;
pub mod model;
pub mod plugins;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    CoordinatorConfig, IdentityStoreConfig, SyncConfig, TargetStoreConfig, TransportConfig,
};
pub use coordinator::{SyncCoordinator, SyncEvent, SyncOutcome};
pub use eligibility::{EligibilityFilter, is_eligible};
pub use error::{Error, Result};
pub use model::{
    AssetId, DhcpEntry, DhcpServer, DnsServer, InterfaceRecord, IpAddressRecord, IpAddressStatus,
    MacAddress, TargetId, TargetKind,
};
pub use plugins::ComponentRegistry;
pub use registry::SyncTargetRegistry;
pub use state::{FileIdentityStore, FileTargetStore, MemoryIdentityStore, MemoryTargetStore};
pub use traits::{IdentityStore, PushTransport, TargetStore};
