//! Test doubles and common utilities for contract tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dhcp_core::config::CoordinatorConfig;
use dhcp_core::error::{Error, Result};
use dhcp_core::model::{
    AssetId, DhcpEntry, DhcpServer, DnsServer, InterfaceRecord, IpAddressRecord, IpAddressStatus,
    MacAddress,
};
use dhcp_core::traits::{IdentityStore, PushTransport, TargetStore};
use dhcp_core::{
    EligibilityFilter, FixedClock, MemoryIdentityStore, MemoryTargetStore, SyncCoordinator,
    SyncEvent, SyncTargetRegistry,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal")
}

pub fn mac(s: &str) -> MacAddress {
    s.parse().expect("valid MAC literal")
}

/// Fixed "now" used by coordinator tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 9, 12, 0, 0).unwrap()
}

/// A record that passes every eligibility condition
pub fn eligible_record(addr: &str, hostname: &str, mac_addr: &str) -> IpAddressRecord {
    IpAddressRecord::new(ip(addr))
        .with_status(IpAddressStatus::Active)
        .with_hostname(hostname)
        .with_interface(
            InterfaceRecord::new()
                .with_mac(mac(mac_addr))
                .with_asset(AssetId(1)),
        )
}

/// A transport that records pushes and fails for chosen targets
#[derive(Default)]
pub struct ScriptedTransport {
    failing: Mutex<HashSet<IpAddr>>,
    pushes: Mutex<Vec<(IpAddr, Vec<DhcpEntry>)>>,
    call_count: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every push to `target` fail
    pub fn fail_for(&self, target: IpAddr) {
        self.failing.lock().unwrap().insert(target);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Successful pushes, in completion order
    pub fn pushes(&self) -> Vec<(IpAddr, Vec<DhcpEntry>)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PushTransport for ScriptedTransport {
    async fn push(&self, target: IpAddr, entries: &[DhcpEntry]) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&target) {
            return Err(Error::push_failed(target, "connection refused"));
        }

        self.pushes
            .lock()
            .unwrap()
            .push((target, entries.to_vec()));
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// An identity store whose backend is down
pub struct UnavailableIdentityStore;

#[async_trait::async_trait]
impl IdentityStore for UnavailableIdentityStore {
    async fn list_ip_addresses(&self) -> Result<Vec<IpAddressRecord>> {
        Err(Error::store_unavailable("inventory database unreachable"))
    }

    async fn get_ip_address(&self, _address: IpAddr) -> Result<Option<IpAddressRecord>> {
        Err(Error::store_unavailable("inventory database unreachable"))
    }
}

/// A target store that cannot persist timestamp updates
pub struct ReadOnlyTimestampStore {
    inner: MemoryTargetStore,
}

impl ReadOnlyTimestampStore {
    pub fn wrapping(inner: MemoryTargetStore) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl TargetStore for ReadOnlyTimestampStore {
    async fn insert_dhcp_server(&self, ip: IpAddr) -> Result<DhcpServer> {
        self.inner.insert_dhcp_server(ip).await
    }

    async fn insert_dns_server(&self, ip: IpAddr, is_default: bool) -> Result<DnsServer> {
        self.inner.insert_dns_server(ip, is_default).await
    }

    async fn get_dhcp_server(&self, ip: IpAddr) -> Result<Option<DhcpServer>> {
        self.inner.get_dhcp_server(ip).await
    }

    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>> {
        self.inner.list_dhcp_servers().await
    }

    async fn list_dns_servers(&self, default_only: bool) -> Result<Vec<DnsServer>> {
        self.inner.list_dns_servers(default_only).await
    }

    async fn set_last_synchronized(&self, _ip: IpAddr, _at: DateTime<Utc>) -> Result<u64> {
        Err(Error::store_unavailable("target database is read-only"))
    }

    async fn remove_dhcp_server(&self, ip: IpAddr) -> Result<u64> {
        self.inner.remove_dhcp_server(ip).await
    }

    async fn remove_dns_server(&self, ip: IpAddr) -> Result<u64> {
        self.inner.remove_dns_server(ip).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Everything a coordinator test needs to inspect afterwards
pub struct Harness {
    pub identities: MemoryIdentityStore,
    pub registry: SyncTargetRegistry,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<FixedClock>,
    pub coordinator: SyncCoordinator,
    pub events: mpsc::Receiver<SyncEvent>,
}

/// Coordinator over in-memory stores with a fixed clock at [`t0`]
pub fn harness(records: Vec<IpAddressRecord>, config: CoordinatorConfig) -> Harness {
    harness_with_store(records, Arc::new(MemoryTargetStore::new()), config)
}

pub fn harness_with_store(
    records: Vec<IpAddressRecord>,
    target_store: Arc<dyn TargetStore>,
    config: CoordinatorConfig,
) -> Harness {
    let identities = MemoryIdentityStore::with_records(records);
    let clock = Arc::new(FixedClock::new(t0()));
    let registry = SyncTargetRegistry::with_clock(target_store, clock.clone());
    let transport = Arc::new(ScriptedTransport::new());

    let (coordinator, events) = SyncCoordinator::new(
        EligibilityFilter::new(Arc::new(identities.clone())),
        registry.clone(),
        transport.clone(),
        config,
    )
    .expect("coordinator construction succeeds");

    Harness {
        identities,
        registry,
        transport,
        clock,
        coordinator,
        events,
    }
}

/// Drain every event currently buffered
pub fn drain(events: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
