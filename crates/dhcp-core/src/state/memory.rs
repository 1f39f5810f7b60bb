// # Memory Target Store
//
// In-memory implementation of TargetStore.
//
// ## Purpose
//
// Fast, non-persistent storage of DHCP and DNS server records. Useful for
// tests, for embedding, and for deployments that re-seed their targets from
// configuration on every start.
//
// ## Crash Behavior
//
// - All registrations and timestamps are lost on restart
// - Every target looks never-synchronized after a restart

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::table::TargetTable;
use crate::Error;
use crate::model::{DhcpServer, DnsServer};
use crate::traits::target_store::{TargetStore, TargetStoreFactory};

/// In-memory target store implementation
///
/// # Example
///
/// ```rust,no_run
/// use dhcp_core::state::MemoryTargetStore;
/// use dhcp_core::traits::TargetStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTargetStore::new();
///
///     store.insert_dhcp_server("10.0.0.1".parse()?).await?;
///     let servers = store.list_dhcp_servers().await?;
///     assert_eq!(servers.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTargetStore {
    inner: Arc<RwLock<TargetTable>>,
}

impl MemoryTargetStore {
    /// Create a new empty memory target store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TargetTable::new())),
        }
    }

    /// Number of records across both variants
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryTargetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn insert_dhcp_server(&self, ip: IpAddr) -> Result<DhcpServer, Error> {
        self.inner.write().await.insert_dhcp_server(ip)
    }

    async fn insert_dns_server(&self, ip: IpAddr, is_default: bool) -> Result<DnsServer, Error> {
        self.inner.write().await.insert_dns_server(ip, is_default)
    }

    async fn get_dhcp_server(&self, ip: IpAddr) -> Result<Option<DhcpServer>, Error> {
        Ok(self.inner.read().await.get_dhcp_server(ip))
    }

    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>, Error> {
        Ok(self.inner.read().await.list_dhcp_servers())
    }

    async fn list_dns_servers(&self, default_only: bool) -> Result<Vec<DnsServer>, Error> {
        Ok(self.inner.read().await.list_dns_servers(default_only))
    }

    async fn set_last_synchronized(&self, ip: IpAddr, at: DateTime<Utc>) -> Result<u64, Error> {
        Ok(self.inner.write().await.set_last_synchronized(ip, at))
    }

    async fn remove_dhcp_server(&self, ip: IpAddr) -> Result<u64, Error> {
        Ok(self.inner.write().await.remove_dhcp_server(ip))
    }

    async fn remove_dns_server(&self, ip: IpAddr) -> Result<u64, Error> {
        Ok(self.inner.write().await.remove_dns_server(ip))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for [`MemoryTargetStore`]
pub struct MemoryTargetStoreFactory;

#[async_trait]
impl TargetStoreFactory for MemoryTargetStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn TargetStore>, Error> {
        Ok(Box::new(MemoryTargetStore::new()))
    }
}
