// # Target Store Trait
//
// Persistent storage for sync targets: DHCP servers and DNS servers.
//
// ## Invariants
//
// - At most one DHCP server per IP, at most one DNS server per IP. The check
//   and the insert happen atomically.
// - `set_last_synchronized` never creates a record.
//
// ## Implementations
//
// - `MemoryTargetStore`: non-persistent, for tests and embedding
// - `FileTargetStore`: JSON file with atomic writes and backup recovery

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::model::{DhcpServer, DnsServer};

/// Trait for target store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert a DHCP server
    ///
    /// # Returns
    ///
    /// - `Ok(DhcpServer)`: The stored record with its assigned id
    /// - `Err(Error::DuplicateIp)`: A DHCP server with this IP exists; nothing changed
    async fn insert_dhcp_server(&self, ip: IpAddr) -> Result<DhcpServer, crate::Error>;

    /// Insert a DNS server
    ///
    /// Same uniqueness rule as [`insert_dhcp_server`](Self::insert_dhcp_server),
    /// checked against DNS servers only.
    async fn insert_dns_server(
        &self,
        ip: IpAddr,
        is_default: bool,
    ) -> Result<DnsServer, crate::Error>;

    /// Look up a DHCP server by IP
    async fn get_dhcp_server(&self, ip: IpAddr) -> Result<Option<DhcpServer>, crate::Error>;

    /// All DHCP servers, ordered by IP
    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>, crate::Error>;

    /// DNS servers ordered by IP, optionally only those flagged default
    async fn list_dns_servers(&self, default_only: bool) -> Result<Vec<DnsServer>, crate::Error>;

    /// Set `last_synchronized` on the DHCP server with this IP
    ///
    /// # Returns
    ///
    /// Number of records updated: `1` if the server exists, `0` otherwise.
    async fn set_last_synchronized(
        &self,
        ip: IpAddr,
        at: DateTime<Utc>,
    ) -> Result<u64, crate::Error>;

    /// Remove a DHCP server; returns the number of records removed
    async fn remove_dhcp_server(&self, ip: IpAddr) -> Result<u64, crate::Error>;

    /// Remove a DNS server; returns the number of records removed
    async fn remove_dns_server(&self, ip: IpAddr) -> Result<u64, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing target stores from configuration
#[async_trait]
pub trait TargetStoreFactory: Send + Sync {
    /// Create a TargetStore instance from its serialized configuration
    async fn create(&self, config: &serde_json::Value)
    -> Result<Box<dyn TargetStore>, crate::Error>;
}
