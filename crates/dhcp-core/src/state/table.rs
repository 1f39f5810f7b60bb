// Shared in-memory representation of the target tables.
//
// Both target stores keep one `TargetTable` behind an async RwLock; the file
// store additionally serializes it. Every operation here is synchronous, so
// a caller holding the write guard gets check-and-insert atomicity for free.

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DhcpServer, DnsServer, TargetId, TargetKind};

#[derive(Debug, Clone, Default)]
pub(crate) struct TargetTable {
    dhcp_servers: BTreeMap<IpAddr, DhcpServer>,
    dns_servers: BTreeMap<IpAddr, DnsServer>,
    next_id: u64,
}

/// On-disk shape of a [`TargetTable`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TargetTableSnapshot {
    pub next_id: u64,
    #[serde(default)]
    pub dhcp_servers: Vec<DhcpServer>,
    #[serde(default)]
    pub dns_servers: Vec<DnsServer>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    fn allocate_id(&mut self) -> Result<TargetId> {
        let next = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| Error::store_unavailable("Target id space exhausted"))?;
        let id = TargetId(self.next_id);
        self.next_id = next;
        Ok(id)
    }

    pub fn insert_dhcp_server(&mut self, ip: IpAddr) -> Result<DhcpServer> {
        if self.dhcp_servers.contains_key(&ip) {
            return Err(Error::duplicate_ip(TargetKind::DhcpServer, ip));
        }

        let server = DhcpServer {
            id: self.allocate_id()?,
            ip,
            last_synchronized: None,
        };
        self.dhcp_servers.insert(ip, server.clone());
        Ok(server)
    }

    pub fn insert_dns_server(&mut self, ip: IpAddr, is_default: bool) -> Result<DnsServer> {
        if self.dns_servers.contains_key(&ip) {
            return Err(Error::duplicate_ip(TargetKind::DnsServer, ip));
        }

        let server = DnsServer {
            id: self.allocate_id()?,
            ip,
            is_default,
        };
        self.dns_servers.insert(ip, server.clone());
        Ok(server)
    }

    pub fn get_dhcp_server(&self, ip: IpAddr) -> Option<DhcpServer> {
        self.dhcp_servers.get(&ip).cloned()
    }

    pub fn list_dhcp_servers(&self) -> Vec<DhcpServer> {
        self.dhcp_servers.values().cloned().collect()
    }

    pub fn list_dns_servers(&self, default_only: bool) -> Vec<DnsServer> {
        self.dns_servers
            .values()
            .filter(|server| !default_only || server.is_default)
            .cloned()
            .collect()
    }

    pub fn set_last_synchronized(&mut self, ip: IpAddr, at: DateTime<Utc>) -> u64 {
        match self.dhcp_servers.get_mut(&ip) {
            Some(server) => {
                server.last_synchronized = Some(at);
                1
            }
            None => 0,
        }
    }

    pub fn remove_dhcp_server(&mut self, ip: IpAddr) -> u64 {
        u64::from(self.dhcp_servers.remove(&ip).is_some())
    }

    pub fn remove_dns_server(&mut self, ip: IpAddr) -> u64 {
        u64::from(self.dns_servers.remove(&ip).is_some())
    }

    pub fn len(&self) -> usize {
        self.dhcp_servers.len() + self.dns_servers.len()
    }

    pub fn snapshot(&self) -> TargetTableSnapshot {
        TargetTableSnapshot {
            next_id: self.next_id,
            dhcp_servers: self.list_dhcp_servers(),
            dns_servers: self.list_dns_servers(false),
        }
    }

    /// Rebuild from a snapshot, rejecting duplicate IPs within a variant
    pub fn from_snapshot(snapshot: TargetTableSnapshot) -> Result<Self> {
        let mut table = Self::new();
        let mut max_id: u64 = 0;

        for server in snapshot.dhcp_servers {
            max_id = max_id.max(server.id.0);
            if table.dhcp_servers.insert(server.ip, server.clone()).is_some() {
                return Err(Error::duplicate_ip(TargetKind::DhcpServer, server.ip));
            }
        }

        for server in snapshot.dns_servers {
            max_id = max_id.max(server.id.0);
            if table.dns_servers.insert(server.ip, server.clone()).is_some() {
                return Err(Error::duplicate_ip(TargetKind::DnsServer, server.ip));
            }
        }

        let after_max = max_id.checked_add(1).ok_or_else(|| {
            Error::store_unavailable(format!("Target id {} leaves no room for new ids", max_id))
        })?;
        table.next_id = snapshot.next_id.max(after_max);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ids_are_shared_and_increasing() {
        let mut table = TargetTable::new();

        let a = table.insert_dhcp_server(ip("10.0.0.1")).unwrap();
        let b = table.insert_dns_server(ip("10.0.0.1"), false).unwrap();
        let c = table.insert_dhcp_server(ip("10.0.0.2")).unwrap();

        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn test_uniqueness_is_per_variant() {
        let mut table = TargetTable::new();

        table.insert_dhcp_server(ip("10.0.0.1")).unwrap();
        assert!(table.insert_dns_server(ip("10.0.0.1"), true).is_ok());
        assert!(matches!(
            table.insert_dhcp_server(ip("10.0.0.1")),
            Err(Error::DuplicateIp { kind: TargetKind::DhcpServer, .. })
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_snapshot_restores_next_id() {
        let mut table = TargetTable::new();
        table.insert_dhcp_server(ip("10.0.0.1")).unwrap();
        table.insert_dhcp_server(ip("10.0.0.2")).unwrap();

        let mut snapshot = table.snapshot();
        snapshot.next_id = 0;

        let mut restored = TargetTable::from_snapshot(snapshot).unwrap();
        let next = restored.insert_dns_server(ip("10.0.0.53"), false).unwrap();
        assert_eq!(next.id, TargetId(3));
    }

    #[test]
    fn test_snapshot_with_duplicate_ip_is_rejected() {
        let server = DhcpServer {
            id: TargetId(1),
            ip: ip("10.0.0.1"),
            last_synchronized: None,
        };
        let snapshot = TargetTableSnapshot {
            next_id: 3,
            dhcp_servers: vec![server.clone(), DhcpServer { id: TargetId(2), ..server }],
            dns_servers: Vec::new(),
        };

        assert!(TargetTable::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_snapshot_with_max_id_is_unavailable() {
        let snapshot = TargetTableSnapshot {
            next_id: 1,
            dhcp_servers: vec![DhcpServer {
                id: TargetId(u64::MAX),
                ip: ip("10.0.0.1"),
                last_synchronized: None,
            }],
            dns_servers: Vec::new(),
        };

        assert!(matches!(
            TargetTable::from_snapshot(snapshot),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_exhausted_id_space_rejects_insert() {
        let mut table = TargetTable::new();
        table.next_id = u64::MAX;

        assert!(matches!(
            table.insert_dhcp_server(ip("10.0.0.1")),
            Err(Error::StoreUnavailable(_))
        ));
        assert!(table.insert_dns_server(ip("10.0.0.53"), true).is_err());
        assert_eq!(table.len(), 0);
        assert_eq!(table.next_id, u64::MAX);
    }
}
