//! Network entity records as known to the management plane.
//!
//! All records are immutable snapshots loaded once per process run.
//! Cross references between entities use opaque reference newtypes; a
//! reference has no meaning beyond looking up the referenced record in
//! the cache.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

macro_rules! opaque_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Wraps an opaque reference string.
            pub fn new(reference: impl Into<String>) -> Self {
                Self(reference.into())
            }

            /// The raw reference string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_ref! {
    /// Opaque reference to a PhysicalInterface record.
    PifRef
}
opaque_ref! {
    /// Opaque reference to a VLAN record.
    VlanRef
}
opaque_ref! {
    /// Opaque reference to a Bond record.
    BondRef
}
opaque_ref! {
    /// Opaque reference to a Network record.
    NetworkRef
}
opaque_ref! {
    /// Opaque reference to a host record.
    HostRef
}
opaque_ref! {
    /// Opaque reference to a management API session.
    SessionRef
}

/// Free-form key/value settings attached to a record.
///
/// Ordered so that serialized snapshots are deterministic.
pub type SettingsMap = BTreeMap<String, String>;

/// VLAN tag value marking a PIF that is not a VLAN PIF.
pub const VLAN_NONE: &str = "-1";

/// IP configuration mode of a PIF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpConfigMode {
    /// No IP configuration on this PIF.
    #[default]
    None,
    /// Address obtained via DHCP.
    Dhcp,
    /// Statically assigned address.
    Static,
}

impl IpConfigMode {
    /// Returns the management-plane spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            IpConfigMode::None => "None",
            IpConfigMode::Dhcp => "DHCP",
            IpConfigMode::Static => "Static",
        }
    }
}

impl FromStr for IpConfigMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(IpConfigMode::None),
            "DHCP" => Ok(IpConfigMode::Dhcp),
            "Static" => Ok(IpConfigMode::Static),
            other => Err(ModelError::MalformedValue {
                field: "ip_configuration_mode",
                value: other.to_string(),
            }),
        }
    }
}

/// One host network interface as known to the management plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PifRecord {
    /// Human id, expected unique per host.
    pub uuid: String,
    /// Raw device name (e.g. `eth0`).
    pub device: String,
    /// MAC address.
    pub mac: String,
    /// VLAN tag, or [`VLAN_NONE`] when this is not a VLAN PIF.
    pub vlan: String,
    /// Whether this is the host's management interface.
    pub management: bool,
    /// The owning network.
    pub network: NetworkRef,
    /// VLAN record this PIF is the untagged/master side of, if any.
    pub vlan_master_of: Option<VlanRef>,
    /// VLAN records this PIF carries tags for.
    pub vlan_slave_of: Vec<VlanRef>,
    /// Bonds this PIF is the master interface of (at most one is valid).
    pub bond_master_of: Vec<BondRef>,
    /// Bonds this PIF is enslaved to (at most one is expected to be
    /// concurrently active).
    pub bond_slave_of: Vec<BondRef>,
    /// IP configuration mode.
    pub ip_configuration_mode: IpConfigMode,
    /// IP address (static mode).
    pub ip: String,
    /// Netmask (static mode).
    pub netmask: String,
    /// Default gateway (static mode).
    pub gateway: String,
    /// Comma-separated DNS servers.
    pub dns: String,
    /// Free-form settings (MTU override, bonding parameters, ethtool
    /// settings).
    pub other_config: SettingsMap,
    /// Whether the datapath is currently up.
    ///
    /// Transient host state: always forced false when loaded from a
    /// persisted snapshot, since attachment does not survive a reboot.
    pub currently_attached: bool,
}

impl Default for PifRecord {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            device: String::new(),
            mac: String::new(),
            vlan: VLAN_NONE.to_string(),
            management: false,
            network: NetworkRef::new(""),
            vlan_master_of: None,
            vlan_slave_of: Vec::new(),
            bond_master_of: Vec::new(),
            bond_slave_of: Vec::new(),
            ip_configuration_mode: IpConfigMode::None,
            ip: String::new(),
            netmask: String::new(),
            gateway: String::new(),
            dns: String::new(),
            other_config: SettingsMap::new(),
            currently_attached: false,
        }
    }
}

impl PifRecord {
    /// True when this PIF is a VLAN PIF.
    pub fn is_vlan(&self) -> bool {
        self.vlan != VLAN_NONE
    }
}

/// A tag-termination relationship between a tagged PIF and its
/// untagged/master PIF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VlanRecord {
    /// Human id.
    pub uuid: String,
    /// The PIF carrying the tagged traffic (the physical side).
    pub tagged_pif: PifRef,
    /// The VLAN PIF where untagged traffic appears.
    pub untagged_pif: PifRef,
}

/// A link-aggregation grouping of PIFs under one master PIF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BondRecord {
    /// Human id.
    pub uuid: String,
    /// The coalesced bond interface.
    pub master: PifRef,
    /// The enslaved member PIFs, in order.
    pub slaves: Vec<PifRef>,
}

/// The management plane's representation of an L2 domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkRecord {
    /// Human id.
    pub uuid: String,
    /// Bridge device name; empty means the network is bridgeless and IP
    /// configuration attaches directly to the raw device.
    pub bridge: String,
    /// Network MTU. Absent on older management-plane versions, in which
    /// case 1500 is assumed.
    pub mtu: Option<String>,
    /// Member PIFs, filtered to those belonging to the current host.
    pub pifs: Vec<PifRef>,
    /// Free-form settings (MTU override, static routes, ethtool
    /// settings).
    pub other_config: SettingsMap,
}
