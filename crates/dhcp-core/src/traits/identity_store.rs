// # Identity Store Trait
//
// Read-only view of the asset inventory: IP address records joined with
// their network interface and the interface's owning asset.
//
// ## Implementations
//
// - In-memory: `MemoryIdentityStore` (tests, embedding)
// - JSON snapshot: `FileIdentityStore` (exported by the inventory)
//
// The eligibility filter is the only consumer. Nothing in this crate ever
// writes to an identity store.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::model::IpAddressRecord;

/// Trait for identity store implementations
///
/// # Errors
///
/// An implementation that cannot reach or read its backing data must return
/// [`Error::StoreUnavailable`](crate::Error::StoreUnavailable). Callers do not
/// retry.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Scan all IP address records, with interface links resolved
    async fn list_ip_addresses(&self) -> Result<Vec<IpAddressRecord>, crate::Error>;

    /// Point lookup by address
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: The record for `address`
    /// - `Ok(None)`: No such address in the inventory
    /// - `Err(Error)`: Store unavailable
    async fn get_ip_address(&self, address: IpAddr)
    -> Result<Option<IpAddressRecord>, crate::Error>;
}

/// Helper trait for constructing identity stores from configuration
#[async_trait]
pub trait IdentityStoreFactory: Send + Sync {
    /// Create an IdentityStore instance from its serialized configuration
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Box<dyn IdentityStore>, crate::Error>;
}
