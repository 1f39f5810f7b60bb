// # Identity Store Implementations
//
// - `MemoryIdentityStore`: records held in memory, mutable by the embedding
//   application (the inventory pushes changes in; this crate only reads)
// - `FileIdentityStore`: JSON snapshot exported by the inventory, re-read on
//   every scan so a fresh export is picked up without restarting
//
// ## Snapshot Format
//
// ```json
// {
//   "ip_addresses": [
//     {
//       "address": "10.0.0.5",
//       "status": "active",
//       "hostname": "host1",
//       "interface": { "mac": "aa:bb:cc:dd:ee:ff", "asset": 42 }
//     }
//   ]
// }
// ```

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::IpAddressRecord;
use crate::traits::identity_store::{IdentityStore, IdentityStoreFactory};

/// In-memory identity store keyed by address
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<RwLock<BTreeMap<IpAddr, IpAddressRecord>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = IpAddressRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.address, r)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Insert or replace the record for its address
    pub async fn upsert(&self, record: IpAddressRecord) {
        self.inner.write().await.insert(record.address, record);
    }

    /// Remove the record for `address`; returns whether it existed
    pub async fn remove(&self, address: IpAddr) -> bool {
        self.inner.write().await.remove(&address).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn list_ip_addresses(&self) -> Result<Vec<IpAddressRecord>, Error> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn get_ip_address(&self, address: IpAddr) -> Result<Option<IpAddressRecord>, Error> {
        Ok(self.inner.read().await.get(&address).cloned())
    }
}

#[derive(Debug, serde::Deserialize)]
struct IdentitySnapshot {
    ip_addresses: Vec<IpAddressRecord>,
}

/// Identity store backed by a JSON snapshot file
///
/// Any failure to read or parse the snapshot is reported as
/// [`Error::StoreUnavailable`].
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<IpAddr, IpAddressRecord>, Error> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to read identity snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let snapshot: IdentitySnapshot = serde_json::from_str(&content).map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to parse identity snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut records = BTreeMap::new();
        for record in snapshot.ip_addresses {
            if records.contains_key(&record.address) {
                tracing::warn!(
                    "Identity snapshot lists {} more than once; keeping the first entry",
                    record.address
                );
                continue;
            }
            records.insert(record.address, record);
        }

        tracing::trace!(
            "Loaded identity snapshot {}: {} records",
            self.path.display(),
            records.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn list_ip_addresses(&self) -> Result<Vec<IpAddressRecord>, Error> {
        Ok(self.load().await?.into_values().collect())
    }

    async fn get_ip_address(&self, address: IpAddr) -> Result<Option<IpAddressRecord>, Error> {
        Ok(self.load().await?.remove(&address))
    }
}

/// Factory for [`FileIdentityStore`]
///
/// Expects `{"type": "file", "path": "..."}`.
pub struct FileIdentityStoreFactory;

#[async_trait]
impl IdentityStoreFactory for FileIdentityStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn IdentityStore>, Error> {
        let path = config["path"]
            .as_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("File identity store requires a non-empty path"))?;

        Ok(Box::new(FileIdentityStore::new(path)))
    }
}
