//! Synchronization target registry
//!
//! Front door for DHCP and DNS server bookkeeping. Uniqueness and atomicity
//! are delegated to the [`TargetStore`]; the registry adds logging, the
//! "now" default for timestamps and the [`TargetId`]-returning API.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dhcp_core::registry::SyncTargetRegistry;
//! use dhcp_core::state::MemoryTargetStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> dhcp_core::Result<()> {
//! let registry = SyncTargetRegistry::new(Arc::new(MemoryTargetStore::new()));
//!
//! let ip = "10.0.0.1".parse().unwrap();
//! registry.register_dhcp_server(ip).await?;
//!
//! // After a successful push
//! assert_eq!(registry.update_last_synchronized(ip, None).await?, 1);
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::model::{DhcpServer, DnsServer, TargetId};
use crate::traits::TargetStore;

/// Registry of DHCP and DNS servers
#[derive(Clone)]
pub struct SyncTargetRegistry {
    store: Arc<dyn TargetStore>,
    clock: Arc<dyn Clock>,
}

impl SyncTargetRegistry {
    /// Create a registry using the wall clock
    pub fn new(store: Arc<dyn TargetStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a registry with an explicit time source
    pub fn with_clock(store: Arc<dyn TargetStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a DHCP server
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateIp`] if a DHCP server with `ip` already exists
    pub async fn register_dhcp_server(&self, ip: IpAddr) -> Result<TargetId> {
        match self.store.insert_dhcp_server(ip).await {
            Ok(server) => {
                info!("Registered DHCP server {} (id {})", ip, server.id);
                Ok(server.id)
            }
            Err(e @ Error::DuplicateIp { .. }) => {
                warn!("Rejected DHCP server registration: {}", e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a DNS server
    ///
    /// Any number of DNS servers may carry `is_default`.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateIp`] if a DNS server with `ip` already exists
    pub async fn register_dns_server(&self, ip: IpAddr, is_default: bool) -> Result<TargetId> {
        match self.store.insert_dns_server(ip, is_default).await {
            Ok(server) => {
                info!(
                    "Registered DNS server {} (id {}, default: {})",
                    ip, server.id, is_default
                );
                Ok(server.id)
            }
            Err(e @ Error::DuplicateIp { .. }) => {
                warn!("Rejected DNS server registration: {}", e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Set `last_synchronized` for the DHCP server at `ip`
    ///
    /// `time` defaults to the registry clock's "now". An explicit `time` is
    /// stored exactly as given.
    ///
    /// # Returns
    ///
    /// `1` if a DHCP server with `ip` exists, `0` otherwise. An unknown `ip` is
    /// not an error and never creates a record.
    pub async fn update_last_synchronized(
        &self,
        ip: IpAddr,
        time: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let at = time.unwrap_or_else(|| self.clock.now());
        let updated = self.store.set_last_synchronized(ip, at).await?;

        if updated == 0 {
            debug!("No DHCP server registered for {}, nothing to update", ip);
        } else {
            debug!("DHCP server {} last synchronized at {}", ip, at);
        }

        Ok(updated)
    }

    /// DNS servers ordered by IP; `default_only` keeps those flagged default
    pub async fn list_dns_servers(&self, default_only: bool) -> Result<Vec<DnsServer>> {
        self.store.list_dns_servers(default_only).await
    }

    /// DHCP servers ordered by IP
    pub async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>> {
        self.store.list_dhcp_servers().await
    }

    /// The DHCP server at `ip`, if registered
    pub async fn get_dhcp_server(&self, ip: IpAddr) -> Result<Option<DhcpServer>> {
        self.store.get_dhcp_server(ip).await
    }

    /// Remove the DHCP server at `ip`; returns the number removed (0 or 1)
    pub async fn unregister_dhcp_server(&self, ip: IpAddr) -> Result<u64> {
        let removed = self.store.remove_dhcp_server(ip).await?;
        if removed > 0 {
            info!("Unregistered DHCP server {}", ip);
        }
        Ok(removed)
    }

    /// Remove the DNS server at `ip`; returns the number removed (0 or 1)
    pub async fn unregister_dns_server(&self, ip: IpAddr) -> Result<u64> {
        let removed = self.store.remove_dns_server(ip).await?;
        if removed > 0 {
            info!("Unregistered DNS server {}", ip);
        }
        Ok(removed)
    }

    /// Flush the underlying store
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

impl std::fmt::Debug for SyncTargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTargetRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::TargetKind;
    use crate::state::MemoryTargetStore;
    use chrono::TimeZone;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_register_dhcp_server_twice() {
        let registry = SyncTargetRegistry::new(Arc::new(MemoryTargetStore::new()));

        registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap();
        let err = registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateIp { kind: TargetKind::DhcpServer, .. }
        ));
        assert_eq!(registry.list_dhcp_servers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_defaults_to_clock() {
        let now = Utc.with_ymd_and_hms(2024, 5, 4, 3, 2, 1).unwrap();
        let registry = SyncTargetRegistry::with_clock(
            Arc::new(MemoryTargetStore::new()),
            Arc::new(FixedClock::new(now)),
        );

        registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap();
        assert_eq!(
            registry.update_last_synchronized(ip("10.0.0.1"), None).await.unwrap(),
            1
        );

        let server = registry.get_dhcp_server(ip("10.0.0.1")).await.unwrap().unwrap();
        assert_eq!(server.last_synchronized, Some(now));
    }

    #[tokio::test]
    async fn test_explicit_time_wins_over_clock() {
        let now = Utc.with_ymd_and_hms(2024, 5, 4, 3, 2, 1).unwrap();
        let explicit = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let registry = SyncTargetRegistry::with_clock(
            Arc::new(MemoryTargetStore::new()),
            Arc::new(FixedClock::new(now)),
        );

        registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap();
        registry
            .update_last_synchronized(ip("10.0.0.1"), Some(explicit))
            .await
            .unwrap();

        let server = registry.get_dhcp_server(ip("10.0.0.1")).await.unwrap().unwrap();
        assert_eq!(server.last_synchronized, Some(explicit));
    }

    #[tokio::test]
    async fn test_multiple_default_dns_servers_are_allowed() {
        let registry = SyncTargetRegistry::new(Arc::new(MemoryTargetStore::new()));

        registry.register_dns_server(ip("10.0.0.53"), true).await.unwrap();
        registry.register_dns_server(ip("10.0.0.54"), true).await.unwrap();
        registry.register_dns_server(ip("10.0.0.55"), false).await.unwrap();

        assert_eq!(registry.list_dns_servers(true).await.unwrap().len(), 2);
        assert_eq!(registry.list_dns_servers(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unregister_then_register_again() {
        let registry = SyncTargetRegistry::new(Arc::new(MemoryTargetStore::new()));

        let first = registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap();
        assert_eq!(registry.unregister_dhcp_server(ip("10.0.0.1")).await.unwrap(), 1);
        assert_eq!(registry.unregister_dhcp_server(ip("10.0.0.1")).await.unwrap(), 0);

        let second = registry.register_dhcp_server(ip("10.0.0.1")).await.unwrap();
        assert_ne!(first, second);
    }
}
