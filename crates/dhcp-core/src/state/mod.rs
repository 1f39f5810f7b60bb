// # Store Implementations
//
// Target stores (DHCP/DNS server records) and identity stores (the read-only
// IP address inventory), each with an in-memory and a file-backed variant.

pub mod file;
pub mod identity;
pub mod memory;
mod table;

pub use file::{FileTargetStore, FileTargetStoreFactory};
pub use identity::{FileIdentityStore, FileIdentityStoreFactory, MemoryIdentityStore};
pub use memory::{MemoryTargetStore, MemoryTargetStoreFactory};
