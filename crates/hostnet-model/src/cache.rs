//! The per-host network topology cache.
//!
//! A [`NetworkCache`] is built once at process start — live from the
//! management API, or from a serialized XML snapshot — and treated as
//! read-only for the remainder of the run. Build it in the entry point
//! and pass it down; there is no global instance.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::api::{ApiPif, ManagementApi, SessionGuard};
use crate::error::{ModelError, ModelResult};
use crate::inventory::Inventory;
use crate::types::{
    BondRecord, BondRef, NetworkRecord, NetworkRef, PifRecord, PifRef, SessionRef, VlanRecord,
    VlanRef,
};
use crate::xml;

/// In-memory snapshot of the network entities belonging to one host.
#[derive(Debug, Clone, Default)]
pub struct NetworkCache {
    pifs: HashMap<PifRef, PifRecord>,
    vlans: HashMap<VlanRef, VlanRecord>,
    bonds: HashMap<BondRef, BondRecord>,
    networks: HashMap<NetworkRef, NetworkRecord>,
}

impl NetworkCache {
    /// Builds a cache from pre-filtered record maps.
    ///
    /// Used by the XML decoder and by tests; live construction goes
    /// through [`from_api`](Self::from_api).
    pub fn from_records(
        pifs: HashMap<PifRef, PifRecord>,
        vlans: HashMap<VlanRef, VlanRecord>,
        bonds: HashMap<BondRef, BondRecord>,
        networks: HashMap<NetworkRef, NetworkRecord>,
    ) -> Self {
        Self {
            pifs,
            vlans,
            bonds,
            networks,
        }
    }

    /// Builds the cache live from the management API.
    ///
    /// Reads the inventory file to learn this host's installation
    /// identifier, resolves it to a host reference, then fetches and
    /// filters every record set down to entities belonging to this
    /// host. When `session` is `None` the constructor logs in itself
    /// and logs out when done, error paths included.
    pub fn from_api(
        api: &dyn ManagementApi,
        session: Option<SessionRef>,
        inventory_path: impl AsRef<Path>,
    ) -> ModelResult<Self> {
        let inventory = Inventory::load(inventory_path)?;
        let uuid = inventory.installation_uuid()?;

        let guard = SessionGuard::new(api, session)?;
        let host = api.host_by_installation_uuid(guard.session(), uuid)?;
        debug!(host = %host, "Resolved local host reference");

        let mut pifs = HashMap::new();
        for ApiPif {
            pif,
            host: pif_host,
            record,
        } in api.pif_records(guard.session())?
        {
            if pif_host == host {
                pifs.insert(pif, record);
            }
        }

        // Foreign VLAN/Bond records are recognizable by their PIF
        // references not resolving to a local PIF.
        let vlans = api
            .vlan_records(guard.session())?
            .into_iter()
            .filter(|(_, v)| pifs.contains_key(&v.untagged_pif))
            .collect();
        let bonds = api
            .bond_records(guard.session())?
            .into_iter()
            .filter(|(_, b)| pifs.contains_key(&b.master))
            .collect();
        let networks = api
            .network_records(guard.session())?
            .into_iter()
            .map(|(r, mut n)| {
                n.pifs.retain(|p| pifs.contains_key(p));
                (r, n)
            })
            .collect();

        let cache = Self {
            pifs,
            vlans,
            bonds,
            networks,
        };
        info!(
            pifs = cache.pifs.len(),
            vlans = cache.vlans.len(),
            bonds = cache.bonds.len(),
            networks = cache.networks.len(),
            "Loaded network cache from management API"
        );
        Ok(cache)
    }

    /// Builds the cache from a serialized XML snapshot file.
    pub fn from_cache_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cache = xml::decode_cache(&content)?;
        info!(
            path = %path.display(),
            pifs = cache.pifs.len(),
            "Loaded network cache from snapshot file"
        );
        Ok(cache)
    }

    /// Serializes the cache to its XML snapshot form.
    pub fn to_xml(&self) -> ModelResult<String> {
        xml::encode_cache(self)
    }

    /// Writes the XML snapshot to `path`, for use at next boot.
    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        let content = self.to_xml()?;
        fs::write(path, content).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// All PIF records.
    pub fn pifs(&self) -> &HashMap<PifRef, PifRecord> {
        &self.pifs
    }

    /// All VLAN records.
    pub fn vlans(&self) -> &HashMap<VlanRef, VlanRecord> {
        &self.vlans
    }

    /// All Bond records.
    pub fn bonds(&self) -> &HashMap<BondRef, BondRecord> {
        &self.bonds
    }

    /// All Network records.
    pub fn networks(&self) -> &HashMap<NetworkRef, NetworkRecord> {
        &self.networks
    }

    /// Looks up a PIF record; a dangling reference is a consistency
    /// error.
    pub fn pif(&self, pif: &PifRef) -> ModelResult<&PifRecord> {
        self.pifs.get(pif).ok_or_else(|| ModelError::MissingRecord {
            kind: "PIF",
            reference: pif.to_string(),
        })
    }

    /// Looks up a Network record; a dangling reference is a consistency
    /// error.
    pub fn network(&self, network: &NetworkRef) -> ModelResult<&NetworkRecord> {
        self.networks
            .get(network)
            .ok_or_else(|| ModelError::MissingRecord {
                kind: "Network",
                reference: network.to_string(),
            })
    }

    /// Looks up a Bond record. Absence is expected (a PIF that simply
    /// is not in any bond), not an error.
    pub fn bond(&self, bond: &BondRef) -> Option<&BondRecord> {
        self.bonds.get(bond)
    }

    /// Looks up a VLAN record. Absence is expected, not an error.
    pub fn vlan(&self, vlan: &VlanRef) -> Option<&VlanRecord> {
        self.vlans.get(vlan)
    }

    /// Finds the PIF with the given human id.
    ///
    /// Human ids are expected unique per host; zero or multiple matches
    /// are consistency errors.
    pub fn get_pif_by_uuid(&self, uuid: &str) -> ModelResult<PifRef> {
        let mut matches: Vec<PifRef> = self
            .pifs
            .iter()
            .filter(|(_, rec)| rec.uuid == uuid)
            .map(|(r, _)| r.clone())
            .collect();
        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(ModelError::PifUuidLookup {
                uuid: uuid.to_string(),
                matches: matches.len(),
            })
        }
    }

    /// Finds all PIFs with the given raw device name.
    ///
    /// Device names are not unique across VLAN/bond variants, so any
    /// number of matches is valid.
    pub fn get_pifs_by_device(&self, device: &str) -> Vec<PifRef> {
        let mut matches: Vec<PifRef> = self
            .pifs
            .iter()
            .filter(|(_, rec)| rec.device == device)
            .map(|(r, _)| r.clone())
            .collect();
        matches.sort();
        matches
    }

    /// Finds the single PIF attached to the given bridge via its owning
    /// network.
    pub fn get_pif_by_bridge(&self, bridge: &str) -> ModelResult<PifRef> {
        let bridge_networks: Vec<&NetworkRef> = self
            .networks
            .iter()
            .filter(|(_, net)| net.bridge == bridge)
            .map(|(r, _)| r)
            .collect();
        if bridge_networks.is_empty() {
            return Err(ModelError::UnknownBridge {
                bridge: bridge.to_string(),
            });
        }

        let mut matches: Vec<PifRef> = self
            .pifs
            .iter()
            .filter(|(_, rec)| bridge_networks.contains(&&rec.network))
            .map(|(r, _)| r.clone())
            .collect();
        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(ModelError::BridgePifLookup {
                bridge: bridge.to_string(),
                matches: matches.len(),
            })
        }
    }

    /// Finds the host's management PIF, if any.
    pub fn get_management_pif(&self) -> Option<PifRef> {
        self.pifs
            .iter()
            .find(|(_, rec)| rec.management)
            .map(|(r, _)| r.clone())
    }

    /// True when the PIF is a VLAN PIF.
    pub fn pif_is_vlan(&self, pif: &PifRef) -> ModelResult<bool> {
        Ok(self.pif(pif)?.is_vlan())
    }

    /// True when the PIF is the coalesced interface of a bond.
    pub fn pif_is_bond(&self, pif: &PifRef) -> ModelResult<bool> {
        Ok(!self.pif(pif)?.bond_master_of.is_empty())
    }

    /// True when the PIF's owning network has a bridge device.
    ///
    /// An empty bridge name means the network is bridgeless and IP
    /// configuration attaches to the raw device. There is no
    /// authoritative bridgeless flag to validate against; the empty
    /// name is trusted as-is.
    pub fn pif_is_bridged(&self, pif: &PifRef) -> ModelResult<bool> {
        let rec = self.pif(pif)?;
        Ok(!self.network(&rec.network)?.bridge.is_empty())
    }

    /// The master PIFs of every bond this PIF is enslaved to.
    ///
    /// A PIF appearing in more than one bond-slave relationship is
    /// tolerated here (only one is expected to be concurrently active);
    /// bonds whose record is missing are skipped.
    pub fn pif_bond_masters(&self, pif: &PifRef) -> ModelResult<Vec<PifRef>> {
        let rec = self.pif(pif)?;
        Ok(rec
            .bond_slave_of
            .iter()
            .filter_map(|b| self.bond(b))
            .map(|b| b.master.clone())
            .collect())
    }

    /// The slave PIFs of the bond this PIF masters.
    ///
    /// Returns an empty list when the PIF masters no bond; a PIF
    /// mastering more than one bond is a consistency error.
    pub fn pif_get_bond_slaves(&self, pif: &PifRef) -> ModelResult<Vec<PifRef>> {
        let rec = self.pif(pif)?;
        match rec.bond_master_of.as_slice() {
            [] => Ok(Vec::new()),
            [bond] => Ok(self
                .bond(bond)
                .map(|b| b.slaves.clone())
                .unwrap_or_default()),
            bonds => Err(ModelError::MultipleBonds {
                pif: pif.to_string(),
                count: bonds.len(),
            }),
        }
    }

    /// The physical PIF underlying a VLAN PIF.
    pub fn pif_get_vlan_physical(&self, pif: &PifRef) -> ModelResult<PifRef> {
        let rec = self.pif(pif)?;
        let vlan_ref = rec
            .vlan_master_of
            .as_ref()
            .ok_or_else(|| ModelError::NotVlanMaster {
                pif: pif.to_string(),
            })?;
        let vlan = self
            .vlan(vlan_ref)
            .ok_or_else(|| ModelError::MissingRecord {
                kind: "VLAN",
                reference: vlan_ref.to_string(),
            })?;
        Ok(vlan.tagged_pif.clone())
    }

    /// All VLAN-master PIFs stacked on top of a physical PIF, filtered
    /// to those still present on this host.
    pub fn pif_get_vlan_masters(&self, pif: &PifRef) -> ModelResult<Vec<PifRef>> {
        let rec = self.pif(pif)?;
        Ok(rec
            .vlan_slave_of
            .iter()
            .filter_map(|v| self.vlan(v))
            .map(|v| v.untagged_pif.clone())
            .filter(|p| self.pifs.contains_key(p))
            .collect())
    }

    /// The raw network device name realizing this PIF: `device` for a
    /// physical PIF, `device.tag` for a VLAN PIF.
    pub fn pif_netdev_name(&self, pif: &PifRef) -> ModelResult<String> {
        let rec = self.pif(pif)?;
        if rec.is_vlan() {
            Ok(format!("{}.{}", rec.device, rec.vlan))
        } else {
            Ok(rec.device.clone())
        }
    }

    /// The device carrying this PIF's IP configuration: the owning
    /// network's bridge when bridged, the raw netdev otherwise.
    pub fn pif_ipdev_name(&self, pif: &PifRef) -> ModelResult<String> {
        let rec = self.pif(pif)?;
        let network = self.network(&rec.network)?;
        if network.bridge.is_empty() {
            self.pif_netdev_name(pif)
        } else {
            Ok(network.bridge.clone())
        }
    }
}
