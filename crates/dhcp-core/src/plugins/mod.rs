//! Plugin-based component registry
//!
//! The registry maps type names to factories for identity stores, target
//! stores and push transports, so the daemon can build everything from a
//! [`SyncConfig`] without hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dhcp_core::ComponentRegistry;
//!
//! let registry = ComponentRegistry::with_builtin_stores();
//! dhcp_push_http::register(&registry);
//!
//! let (coordinator, events) = registry.build_coordinator(&config).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;

use crate::config::{IdentityStoreConfig, SyncConfig, TargetStoreConfig, TransportConfig};
use crate::coordinator::{SyncCoordinator, SyncEvent};
use crate::eligibility::EligibilityFilter;
use crate::error::{Error, Result};
use crate::registry::SyncTargetRegistry;
use crate::state::{FileIdentityStoreFactory, FileTargetStoreFactory, MemoryTargetStoreFactory};
use crate::traits::{
    IdentityStore, IdentityStoreFactory, PushTransport, PushTransportFactory, TargetStore,
    TargetStoreFactory,
};

type FactoryMap<F> = RwLock<HashMap<String, Arc<F>>>;

/// Component registry for plugin-based construction
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct ComponentRegistry {
    identity_stores: FactoryMap<dyn IdentityStoreFactory>,
    target_stores: FactoryMap<dyn TargetStoreFactory>,
    transports: FactoryMap<dyn PushTransportFactory>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in stores registered
    ///
    /// The only built-in identity store is file-backed. Code holding a
    /// [`MemoryIdentityStore`](crate::MemoryIdentityStore) wires it in
    /// through [`SyncCoordinator::new`].
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_identity_store("file", Box::new(FileIdentityStoreFactory));
        registry.register_target_store("memory", Box::new(MemoryTargetStoreFactory));
        registry.register_target_store("file", Box::new(FileTargetStoreFactory));
        registry
    }

    /// Register an identity store factory under `name`
    pub fn register_identity_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn IdentityStoreFactory>,
    ) {
        write(&self.identity_stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a target store factory under `name`
    pub fn register_target_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn TargetStoreFactory>,
    ) {
        write(&self.target_stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a push transport factory under `name`
    pub fn register_transport(
        &self,
        name: impl Into<String>,
        factory: Box<dyn PushTransportFactory>,
    ) {
        write(&self.transports).insert(name.into(), Arc::from(factory));
    }

    /// Create an identity store from configuration
    ///
    /// Built-in types receive their whole serialized config; custom types
    /// receive their `config` payload.
    pub async fn create_identity_store(
        &self,
        config: &IdentityStoreConfig,
    ) -> Result<Box<dyn IdentityStore>> {
        let type_name = config.type_name();
        let factory = read(&self.identity_stores)
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown identity store type: {}", type_name)))?;

        let config_json = match config {
            IdentityStoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// Create a target store from configuration
    pub async fn create_target_store(
        &self,
        config: &TargetStoreConfig,
    ) -> Result<Box<dyn TargetStore>> {
        let type_name = config.type_name();
        let factory = read(&self.target_stores)
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown target store type: {}", type_name)))?;

        let config_json = match config {
            TargetStoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// Create a push transport from configuration
    pub fn create_transport(&self, config: &TransportConfig) -> Result<Box<dyn PushTransport>> {
        let type_name = config.type_name();
        let transports = read(&self.transports);

        let factory = transports
            .get(type_name)
            .ok_or_else(|| Error::config(format!("Unknown transport type: {}", type_name)))?;

        factory.create(config)
    }

    /// Build a ready-to-run coordinator from a full configuration
    pub async fn build_coordinator(
        &self,
        config: &SyncConfig,
    ) -> Result<(SyncCoordinator, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let identity_store: Arc<dyn IdentityStore> =
            Arc::from(self.create_identity_store(&config.identity_store).await?);
        let target_store: Arc<dyn TargetStore> =
            Arc::from(self.create_target_store(&config.target_store).await?);
        let transport: Arc<dyn PushTransport> =
            Arc::from(self.create_transport(&config.transport)?);

        SyncCoordinator::new(
            EligibilityFilter::new(identity_store),
            SyncTargetRegistry::new(target_store),
            transport,
            config.coordinator.clone(),
        )
    }

    /// List registered identity store types
    pub fn list_identity_stores(&self) -> Vec<String> {
        read(&self.identity_stores).keys().cloned().collect()
    }

    /// List registered target store types
    pub fn list_target_stores(&self) -> Vec<String> {
        read(&self.target_stores).keys().cloned().collect()
    }

    /// List registered transport types
    pub fn list_transports(&self) -> Vec<String> {
        read(&self.transports).keys().cloned().collect()
    }

    /// Check if a transport type is registered
    pub fn has_transport(&self, name: &str) -> bool {
        read(&self.transports).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTransportFactory;

    impl PushTransportFactory for MockTransportFactory {
        fn create(&self, _config: &TransportConfig) -> Result<Box<dyn PushTransport>> {
            Err(Error::not_found("Mock transport not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ComponentRegistry::new();
        assert!(!registry.has_transport("mock"));

        registry.register_transport("mock", Box::new(MockTransportFactory));

        assert!(registry.has_transport("mock"));
        assert!(registry.list_transports().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtin_stores_registered() {
        let registry = ComponentRegistry::with_builtin_stores();

        let mut identity = registry.list_identity_stores();
        identity.sort();
        assert_eq!(identity, ["file"]);

        let mut targets = registry.list_target_stores();
        targets.sort();
        assert_eq!(targets, ["file", "memory"]);
    }

    #[tokio::test]
    async fn test_unknown_transport_is_config_error() {
        let registry = ComponentRegistry::with_builtin_stores();
        let config = SyncConfig::new("/tmp/ips.json");

        let result = registry.build_coordinator(&config).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_memory_identity_store_is_not_configurable() {
        let registry = ComponentRegistry::with_builtin_stores();

        let result = registry
            .create_identity_store(&IdentityStoreConfig::Custom {
                factory: "memory".to_string(),
                config: serde_json::json!({}),
            })
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_create_file_target_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let registry = ComponentRegistry::with_builtin_stores();

        let store = registry
            .create_target_store(&TargetStoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await
            .unwrap();

        store.insert_dhcp_server("10.0.0.1".parse().unwrap()).await.unwrap();
        assert!(path.exists());
    }
}
