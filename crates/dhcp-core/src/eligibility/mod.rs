//! DHCP entry eligibility
//!
//! Derives the set of exportable [`DhcpEntry`] values from an
//! [`IdentityStore`]. A record is eligible when ALL of the following hold
//! (see [`is_eligible`]):
//!
//! 1. it has a hostname that is not blank
//! 2. it is linked to a network interface
//! 3. that interface has an owning asset
//! 4. that interface has a MAC address
//! 5. its status is not [`IpAddressStatus::Reserved`]
//!
//! The filter is a pure read. Store failures propagate unchanged.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{DhcpEntry, IpAddressRecord, IpAddressStatus};
use crate::traits::IdentityStore;

/// The eligibility rule
pub fn is_eligible(record: &IpAddressRecord) -> bool {
    let has_hostname = record
        .hostname
        .as_deref()
        .is_some_and(|h| !h.trim().is_empty());

    let interface_ok = record
        .interface
        .as_ref()
        .is_some_and(|iface| iface.asset.is_some() && iface.mac.is_some());

    has_hostname && interface_ok && record.status != IpAddressStatus::Reserved
}

/// Project an eligible record into a [`DhcpEntry`]
///
/// Returns `Ok(None)` for ineligible records. An eligible record without a
/// MAC cannot exist; if one shows up it is reported as [`Error::Internal`].
fn project(record: &IpAddressRecord) -> Result<Option<DhcpEntry>> {
    if !is_eligible(record) {
        return Ok(None);
    }

    let mac = record.mac().ok_or_else(|| {
        Error::internal(format!(
            "Eligible record {} has no interface MAC",
            record.address
        ))
    })?;
    let hostname = record.hostname.as_deref().map(str::trim).ok_or_else(|| {
        Error::internal(format!("Eligible record {} has no hostname", record.address))
    })?;

    Ok(Some(DhcpEntry::new(record.address, hostname.to_string(), mac)))
}

/// Eligibility filter over an identity store
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct EligibilityFilter {
    store: Arc<dyn IdentityStore>,
}

impl EligibilityFilter {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// All eligible entries, ordered by address
    ///
    /// IPv4 addresses sort before IPv6, numerically within each family.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreUnavailable`] from the identity store, unchanged
    /// - [`Error::Internal`] if an eligible record cannot be projected
    pub async fn list_eligible_entries(&self) -> Result<Vec<DhcpEntry>> {
        let records = self.store.list_ip_addresses().await?;
        let scanned = records.len();

        let mut entries = Vec::with_capacity(scanned);
        for record in &records {
            match project(record)? {
                Some(entry) => entries.push(entry),
                None => trace!("Skipping ineligible record {}", record.address),
            }
        }
        entries.sort_by_key(|entry| entry.address());

        debug!("{} of {} IP address records are eligible", entries.len(), scanned);
        Ok(entries)
    }

    /// The eligible entry for `address`, if there is one
    pub async fn find_entry(&self, address: IpAddr) -> Result<Option<DhcpEntry>> {
        match self.store.get_ip_address(address).await? {
            Some(record) => project(&record),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for EligibilityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EligibilityFilter").finish_non_exhaustive()
    }
}
