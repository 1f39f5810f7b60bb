// # File Target Store
//
// File-based implementation of TargetStore with crash recovery.
//
// ## Purpose
//
// Keeps DHCP/DNS server registrations and `last_synchronized` timestamps
// across daemon restarts.
//
// ## Crash Recovery
//
// - Atomic writes: every mutation is written to a temp file, then renamed
// - Automatic backup: the previous good file is kept as `.backup`
// - Recovery: a corrupt main file falls back to the backup
// - A corrupt main file with no usable backup is `StoreUnavailable`; the
//   store never silently starts empty over existing data
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "next_id": 3,
//   "dhcp_servers": [
//     { "id": 1, "ip": "10.0.0.1", "last_synchronized": "2025-01-09T12:00:00Z" }
//   ],
//   "dns_servers": [
//     { "id": 2, "ip": "10.0.0.53", "is_default": true }
//   ]
// }
// ```

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::table::{TargetTable, TargetTableSnapshot};
use crate::Error;
use crate::model::{DhcpServer, DnsServer};
use crate::traits::target_store::{TargetStore, TargetStoreFactory};

/// Target file format version
const TARGET_FILE_VERSION: &str = "1.0";

/// File-based target store with crash recovery
///
/// Mutations are persisted before they become visible: the new table is
/// written to disk first and only then swapped in, all under one write lock.
/// A failed write leaves both the file and the in-memory view unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use dhcp_core::state::FileTargetStore;
/// use dhcp_core::traits::TargetStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTargetStore::new("/var/lib/dhcp-sync/targets.json").await?;
///     store.insert_dhcp_server("10.0.0.1".parse()?).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTargetStore {
    path: PathBuf,
    table: Arc<RwLock<TargetTable>>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct TargetFileFormat {
    version: String,
    #[serde(flatten)]
    table: TargetTableSnapshot,
}

impl FileTargetStore {
    /// Create or load a file target store
    ///
    /// Creates parent directories if needed. A missing file is an empty store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to create target store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let table = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            table: Arc::new(RwLock::new(table)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<TargetTable, Error> {
        match Self::load(path).await {
            Ok(table) => {
                tracing::debug!("Loaded target store: {} records", table.len());
                Ok(table)
            }
            Err(e @ (Error::Json(_) | Error::DuplicateIp { .. })) => {
                tracing::warn!(
                    "Target store file {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    return Err(Error::store_unavailable(format!(
                        "Target store file {} is corrupted and no backup exists: {}",
                        path.display(),
                        e
                    )));
                }

                let table = Self::load(&backup_path).await.map_err(|backup_err| {
                    Error::store_unavailable(format!(
                        "Target store file {} and its backup are both unreadable: {}",
                        path.display(),
                        backup_err
                    ))
                })?;

                tracing::info!("Recovered target store from backup: {} records", table.len());

                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore target store file from backup: {}",
                        restore_err
                    );
                }

                Ok(table)
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<TargetTable, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Target store file does not exist: {}", path.display());
                return Ok(TargetTable::new());
            }
            Err(e) => {
                return Err(Error::store_unavailable(format!(
                    "Failed to read target store file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let file: TargetFileFormat = serde_json::from_str(&content)?;

        if file.version != TARGET_FILE_VERSION {
            tracing::warn!(
                "Target store version mismatch: expected {}, got {}. Attempting to load anyway.",
                TARGET_FILE_VERSION,
                file.version
            );
        }

        TargetTable::from_snapshot(file.table)
    }

    /// Write a table to disk atomically
    async fn write_table(&self, table: &TargetTable) -> Result<(), Error> {
        let file = TargetFileFormat {
            version: TARGET_FILE_VERSION.to_string(),
            table: table.snapshot(),
        };

        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.sync_all().await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create target store backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Target store written: {}", self.path.display());
        Ok(())
    }

    /// Apply a mutation and persist it before publishing
    ///
    /// `f` returns the operation result and whether anything changed.
    async fn apply<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send,
        F: FnOnce(&mut TargetTable) -> Result<(T, bool), Error> + Send,
    {
        let mut guard = self.table.write().await;
        let mut next = guard.clone();

        let (value, changed) = f(&mut next)?;
        if changed {
            self.write_table(&next).await?;
            *guard = next;
        }

        Ok(value)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl TargetStore for FileTargetStore {
    async fn insert_dhcp_server(&self, ip: IpAddr) -> Result<DhcpServer, Error> {
        self.apply(|table| table.insert_dhcp_server(ip).map(|s| (s, true)))
            .await
    }

    async fn insert_dns_server(&self, ip: IpAddr, is_default: bool) -> Result<DnsServer, Error> {
        self.apply(|table| table.insert_dns_server(ip, is_default).map(|s| (s, true)))
            .await
    }

    async fn get_dhcp_server(&self, ip: IpAddr) -> Result<Option<DhcpServer>, Error> {
        Ok(self.table.read().await.get_dhcp_server(ip))
    }

    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>, Error> {
        Ok(self.table.read().await.list_dhcp_servers())
    }

    async fn list_dns_servers(&self, default_only: bool) -> Result<Vec<DnsServer>, Error> {
        Ok(self.table.read().await.list_dns_servers(default_only))
    }

    async fn set_last_synchronized(&self, ip: IpAddr, at: DateTime<Utc>) -> Result<u64, Error> {
        self.apply(|table| {
            let count = table.set_last_synchronized(ip, at);
            Ok((count, count > 0))
        })
        .await
    }

    async fn remove_dhcp_server(&self, ip: IpAddr) -> Result<u64, Error> {
        self.apply(|table| {
            let count = table.remove_dhcp_server(ip);
            Ok((count, count > 0))
        })
        .await
    }

    async fn remove_dns_server(&self, ip: IpAddr) -> Result<u64, Error> {
        self.apply(|table| {
            let count = table.remove_dns_server(ip);
            Ok((count, count > 0))
        })
        .await
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every mutation is already on disk
        Ok(())
    }
}

/// Factory for [`FileTargetStore`]
///
/// Expects `{"type": "file", "path": "..."}`.
pub struct FileTargetStoreFactory;

#[async_trait]
impl TargetStoreFactory for FileTargetStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn TargetStore>, Error> {
        let path = config["path"]
            .as_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("File target store requires a non-empty path"))?;

        Ok(Box::new(FileTargetStore::new(path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let store = FileTargetStore::new(&path).await.unwrap();
        assert!(store.list_dhcp_servers().await.unwrap().is_empty());

        store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap();
        store.insert_dns_server(ip("10.0.0.53"), true).await.unwrap();
        assert!(path.exists());

        let reloaded = FileTargetStore::new(&path).await.unwrap();
        assert_eq!(reloaded.list_dhcp_servers().await.unwrap().len(), 1);
        assert_eq!(reloaded.list_dns_servers(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_timestamp_is_exact_after_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

        let store = FileTargetStore::new(&path).await.unwrap();
        store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap();
        assert_eq!(store.set_last_synchronized(ip("10.0.0.1"), at).await.unwrap(), 1);

        let reloaded = FileTargetStore::new(&path).await.unwrap();
        let server = reloaded.get_dhcp_server(ip("10.0.0.1")).await.unwrap().unwrap();
        assert_eq!(server.last_synchronized, Some(at));
    }

    #[tokio::test]
    async fn test_file_store_duplicate_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let store = FileTargetStore::new(&path).await.unwrap();
        store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap();
        let before = fs::read_to_string(&path).await.unwrap();

        let err = store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateIp { .. }));

        let after = fs::read_to_string(&path).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_file_store_ids_continue_after_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let store = FileTargetStore::new(&path).await.unwrap();
        let first = store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap();

        let reloaded = FileTargetStore::new(&path).await.unwrap();
        let second = reloaded.insert_dhcp_server(ip("10.0.0.2")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let store = FileTargetStore::new(&path).await.unwrap();
        store.insert_dhcp_server(ip("10.0.0.1")).await.unwrap();
        // Second write rotates the first into the backup
        store.insert_dhcp_server(ip("10.0.0.2")).await.unwrap();

        let backup_path = FileTargetStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileTargetStore::new(&path).await.unwrap();
        let servers = recovered.list_dhcp_servers().await.unwrap();
        assert_eq!(servers.len(), 1, "Backup holds the state before the last write");
        assert_eq!(servers[0].ip, ip("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_file_store_corruption_without_backup_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let err = FileTargetStore::new(&path).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test]
    async fn test_factory_requires_path() {
        let factory = FileTargetStoreFactory;
        let result = factory.create(&serde_json::json!({ "type": "file" })).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_file_store_with_exhausted_ids_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.json");
        fs::write(
            &path,
            r#"{
                "version": "1.0",
                "next_id": 1,
                "dhcp_servers": [
                    { "id": 18446744073709551615, "ip": "10.0.0.1", "last_synchronized": null }
                ],
                "dns_servers": []
            }"#,
        )
        .await
        .unwrap();

        let err = FileTargetStore::new(&path).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
