// # Push Transport Trait
//
// Delivers the current DHCP entry set to one DHCP server.
//
// ## Implementations
//
// - HTTP: `dhcp-push-http` crate
//
// Transports are single-shot: one call, one delivery attempt. They hold no
// state between calls and never touch the target store. Whether and when a
// target's `last_synchronized` changes is decided by `SyncCoordinator`.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::model::DhcpEntry;

/// Trait for push transport implementations
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Push `entries` to the DHCP server at `target`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The target confirmed receipt
    /// - `Err(Error)`: Delivery failed; the coordinator records it and moves on
    async fn push(&self, target: IpAddr, entries: &[DhcpEntry]) -> Result<(), crate::Error>;

    /// Transport name (for logging)
    fn transport_name(&self) -> &'static str;
}

/// Helper trait for constructing push transports from configuration
pub trait PushTransportFactory: Send + Sync {
    /// Create a PushTransport instance from configuration
    fn create(
        &self,
        config: &crate::config::TransportConfig,
    ) -> Result<Box<dyn PushTransport>, crate::Error>;
}
