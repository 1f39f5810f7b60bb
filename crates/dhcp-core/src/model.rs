//! Domain records
//!
//! Identity records ([`IpAddressRecord`], [`InterfaceRecord`]) come from the
//! external inventory and are read-only here. [`DhcpEntry`] is a projection
//! computed on demand. [`DhcpServer`] and [`DnsServer`] are the sync targets
//! persisted by a [`TargetStore`](crate::traits::TargetStore).

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Reference to the asset that owns a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// 48-bit hardware address
///
/// Parses `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff` in any case. Always
/// displayed and serialized lower-case and colon-separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(mac_address::MacAddress);

impl MacAddress {
    /// Build from raw octets
    pub fn new(octets: [u8; 6]) -> Self {
        Self(mac_address::MacAddress::new(octets))
    }

    /// Raw octets
    pub fn octets(&self) -> [u8; 6] {
        self.0.bytes()
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<mac_address::MacAddress>()
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("Invalid MAC address {}: {}", s, e)))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Allocation status of an IP address record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpAddressStatus {
    /// In use by a host
    #[serde(alias = "used")]
    Active,
    /// Held back; never exported
    Reserved,
    /// Status not recorded
    #[default]
    Unknown,
}

/// Network interface as seen by the identity store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Hardware address
    #[serde(default)]
    pub mac: Option<MacAddress>,
    /// Owning physical or virtual asset
    #[serde(default)]
    pub asset: Option<AssetId>,
}

impl InterfaceRecord {
    /// Interface with neither MAC nor owner
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hardware address
    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    /// Set the owning asset
    pub fn with_asset(mut self, asset: AssetId) -> Self {
        self.asset = Some(asset);
        self
    }
}

/// IP address record, joined with its interface
///
/// `address` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddressRecord {
    pub address: IpAddr,
    #[serde(default)]
    pub status: IpAddressStatus,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub interface: Option<InterfaceRecord>,
}

impl IpAddressRecord {
    /// Bare record with unknown status and no links
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            status: IpAddressStatus::Unknown,
            hostname: None,
            interface: None,
        }
    }

    pub fn with_status(mut self, status: IpAddressStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_interface(mut self, interface: InterfaceRecord) -> Self {
        self.interface = Some(interface);
        self
    }

    /// MAC of the linked interface, if both exist
    pub fn mac(&self) -> Option<MacAddress> {
        self.interface.as_ref().and_then(|iface| iface.mac)
    }
}

/// A DHCP-exportable identity
///
/// Only produced by the eligibility filter; the MAC is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpEntry {
    address: IpAddr,
    hostname: String,
    mac: MacAddress,
}

impl DhcpEntry {
    pub(crate) fn new(address: IpAddr, hostname: String, mac: MacAddress) -> Self {
        Self {
            address,
            hostname,
            mac,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }
}

/// Store-assigned identifier of a sync target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sync target variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    DhcpServer,
    DnsServer,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::DhcpServer => write!(f, "DHCP server"),
            TargetKind::DnsServer => write!(f, "DNS server"),
        }
    }
}

/// DHCP server receiving configuration pushes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpServer {
    pub id: TargetId,
    pub ip: IpAddr,
    /// Time of the last confirmed successful push
    pub last_synchronized: Option<DateTime<Utc>>,
}

/// DNS server known to the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    pub id: TargetId,
    pub ip: IpAddr,
    #[serde(default)]
    pub is_default: bool,
}

impl fmt::Display for DnsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_formats() {
        let expected = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

        assert_eq!("aa:bb:cc:dd:ee:ff".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("AA-BB-CC-DD-EE-FF".parse::<MacAddress>().unwrap(), expected);
        assert_eq!(" aa:bb:cc:dd:ee:ff\n".parse::<MacAddress>().unwrap(), expected);
        assert_eq!(expected.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn test_mac_rejects_garbage() {
        assert!("".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:gg".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<MacAddress>().is_err());
        assert!("aabb.ccdd.eeff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_display_is_lowercase_colon() {
        let mac: MacAddress = "AA-BB-CC-01-02-03".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:01:02:03");
    }

    #[test]
    fn test_mac_serializes_lowercase() {
        let mac: MacAddress = serde_json::from_str("\"AA:BB:CC:01:02:03\"").unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"aa:bb:cc:01:02:03\"");
    }

    #[test]
    fn test_status_accepts_legacy_used() {
        let status: IpAddressStatus = serde_json::from_str("\"used\"").unwrap();
        assert_eq!(status, IpAddressStatus::Active);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: IpAddressRecord =
            serde_json::from_str(r#"{"address":"10.0.0.5"}"#).unwrap();
        assert_eq!(record.status, IpAddressStatus::Unknown);
        assert!(record.hostname.is_none());
        assert!(record.mac().is_none());
    }

    #[test]
    fn test_dns_server_displays_ip() {
        let server = DnsServer {
            id: TargetId(1),
            ip: "10.0.0.53".parse().unwrap(),
            is_default: true,
        };
        assert_eq!(server.to_string(), "10.0.0.53");
    }
}
