//! Contract Test: DHCP Entry Eligibility
//!
//! Constraints verified:
//! - Reserved records are never exported, whatever else they carry
//! - Missing hostname, interface, owning asset or MAC excludes a record
//! - Every exported entry carries its interface's MAC
//! - Exported hostnames are trimmed of surrounding whitespace
//! - Identity store failures surface unchanged as StoreUnavailable

mod common;

use common::*;
use dhcp_core::model::{AssetId, InterfaceRecord, IpAddressRecord, IpAddressStatus};
use dhcp_core::{EligibilityFilter, Error, MemoryIdentityStore};
use std::sync::Arc;

fn filter_over(store: &MemoryIdentityStore) -> EligibilityFilter {
    EligibilityFilter::new(Arc::new(store.clone()))
}

#[tokio::test]
async fn reserved_records_are_never_listed() {
    let store = MemoryIdentityStore::with_records([
        eligible_record("10.0.0.1", "a", "02:00:00:00:00:01").with_status(IpAddressStatus::Reserved),
        eligible_record("10.0.0.2", "b", "02:00:00:00:00:02"),
    ]);

    let entries = filter_over(&store).list_eligible_entries().await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address(), ip("10.0.0.2"));
}

#[tokio::test]
async fn incomplete_records_are_excluded() {
    let mut no_hostname = eligible_record("10.0.1.1", "x", "02:00:00:00:01:01");
    no_hostname.hostname = None;

    let empty_hostname = eligible_record("10.0.1.2", "", "02:00:00:00:01:02");

    let mut no_interface = eligible_record("10.0.1.3", "x", "02:00:00:00:01:03");
    no_interface.interface = None;

    let no_asset = IpAddressRecord::new(ip("10.0.1.4"))
        .with_status(IpAddressStatus::Active)
        .with_hostname("x")
        .with_interface(InterfaceRecord::new().with_mac(mac("02:00:00:00:01:04")));

    let no_mac = IpAddressRecord::new(ip("10.0.1.5"))
        .with_status(IpAddressStatus::Active)
        .with_hostname("x")
        .with_interface(InterfaceRecord::new().with_asset(AssetId(7)));

    let store = MemoryIdentityStore::with_records([
        no_hostname,
        empty_hostname,
        no_interface,
        no_asset,
        no_mac,
    ]);

    let entries = filter_over(&store).list_eligible_entries().await.unwrap();
    assert!(entries.is_empty(), "Expected no entries, got {:?}", entries);
}

#[tokio::test]
async fn every_entry_carries_its_interface_mac() {
    let records = vec![
        eligible_record("10.0.2.1", "one", "02:00:00:00:02:01"),
        eligible_record("10.0.2.2", "two", "02:00:00:00:02:02"),
        eligible_record("fd00::3", "three", "02:00:00:00:02:03"),
    ];
    let store = MemoryIdentityStore::with_records(records.clone());

    let entries = filter_over(&store).list_eligible_entries().await.unwrap();
    assert_eq!(entries.len(), records.len());

    for entry in entries {
        let source = records
            .iter()
            .find(|r| r.address == entry.address())
            .expect("entry comes from a record");
        assert_eq!(Some(entry.mac()), source.mac());
        assert_eq!(Some(entry.hostname()), source.hostname.as_deref());
    }
}

#[tokio::test]
async fn exported_hostname_is_trimmed() {
    let store = MemoryIdentityStore::with_records([eligible_record(
        "10.0.3.1",
        "  host1\n",
        "02:00:00:00:03:01",
    )]);
    let filter = filter_over(&store);

    let entries = filter.list_eligible_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].hostname(), "host1");

    let entry = filter.find_entry(ip("10.0.3.1")).await.unwrap().unwrap();
    assert_eq!(entry.hostname(), "host1");
}

#[tokio::test]
async fn reserving_an_address_removes_it_from_the_list() {
    let store = MemoryIdentityStore::with_records([eligible_record(
        "10.0.0.5",
        "host1",
        "aa:bb:cc:dd:ee:ff",
    )]);
    let filter = filter_over(&store);

    let entries = filter.list_eligible_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address(), ip("10.0.0.5"));
    assert_eq!(entries[0].hostname(), "host1");
    assert_eq!(entries[0].mac().to_string(), "aa:bb:cc:dd:ee:ff");

    store
        .upsert(
            eligible_record("10.0.0.5", "host1", "aa:bb:cc:dd:ee:ff")
                .with_status(IpAddressStatus::Reserved),
        )
        .await;

    let entries = filter.list_eligible_entries().await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn store_unavailable_propagates() {
    let filter = EligibilityFilter::new(Arc::new(UnavailableIdentityStore));

    let err = filter.list_eligible_entries().await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)), "got {:?}", err);

    let err = filter.find_entry(ip("10.0.0.5")).await.unwrap_err();
    assert!(err.is_store_unavailable());
}
