//! Durable XML snapshot codec for the network cache.
//!
//! The snapshot is the boot-time substitute for the management API: it
//! must round-trip through this codec without reference to anything
//! else. The root element tags the document as a network configuration
//! snapshot; its children are one of four entity tags (`PIF`, `VLAN`,
//! `Bond`, `Network`), each carrying a `ref` attribute and one child
//! element per field, list-valued fields nested one level deeper.
//!
//! Strictness is asymmetric on purpose: encoding rejects free-form
//! setting keys that are not in the entity's allow-list (catching code
//! that adds a field without registering it), while decoding skips
//! unknown elements (tolerating old or future snapshot files). The one
//! special case is the PIF `currently_attached` field, which encodes
//! the live value but always decodes to `false`: attachment state does
//! not survive a reboot and must not be trusted from stale data.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

use crate::cache::NetworkCache;
use crate::error::{ModelError, ModelResult};
use crate::types::{
    BondRecord, BondRef, NetworkRecord, NetworkRef, PifRecord, PifRef, VlanRecord, VlanRef,
};

/// Root element tag of a snapshot document.
pub const ROOT_TAG: &str = "host-network-configuration";

const PIF_TAG: &str = "PIF";
const VLAN_TAG: &str = "VLAN";
const BOND_TAG: &str = "Bond";
const NETWORK_TAG: &str = "Network";

/// Setting keys accepted in a PIF's `other_config`.
const PIF_SETTING_KEYS: &[&str] = &[
    "domain",
    "peerdns",
    "defaultroute",
    "mtu",
    "static-routes",
    "ethtool-speed",
    "ethtool-duplex",
    "ethtool-autoneg",
    "ethtool-rx",
    "ethtool-tx",
    "ethtool-sg",
    "ethtool-tso",
    "ethtool-ufo",
    "ethtool-gso",
    "bond-mode",
    "bond-miimon",
    "bond-downdelay",
    "bond-updelay",
];

/// Setting keys accepted in a Network's `other_config`.
const NETWORK_SETTING_KEYS: &[&str] = &[
    "mtu",
    "static-routes",
    "ethtool-speed",
    "ethtool-duplex",
    "ethtool-autoneg",
    "ethtool-rx",
    "ethtool-tx",
    "ethtool-sg",
    "ethtool-tso",
    "ethtool-ufo",
    "ethtool-gso",
];

/// A parsed XML element, attributes and text trimmed.
#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn leaf(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn add_leaf(&mut self, name: &str, text: &str) {
        self.children.push(Element::leaf(name, text));
    }
}

fn element_from_start(start: &BytesStart<'_>) -> ModelResult<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(ModelError::xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(ModelError::xml)?.into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

/// Parses a whole document into an element tree.
fn parse_tree(content: &str) -> ModelResult<Element> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(ModelError::xml)? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(ModelError::xml)?);
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ModelError::xml("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Eof => break,
            // Declarations and comments carry no model content.
            _ => {}
        }
    }

    root.ok_or_else(|| ModelError::xml("document has no root element"))
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> ModelResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(ModelError::xml)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(ModelError::xml)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(ModelError::xml)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(ModelError::xml)?;
    Ok(())
}

fn serialize(root: &Element) -> ModelResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(ModelError::xml)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(ModelError::xml)
}

fn encode_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn decode_bool(value: &str) -> ModelResult<bool> {
    match value {
        "True" => Ok(true),
        "False" => Ok(false),
        other => Err(ModelError::MalformedBoolean {
            value: other.to_string(),
        }),
    }
}

fn refs_to_element<'a>(
    wrapper: &str,
    item: &str,
    refs: impl IntoIterator<Item = &'a str>,
) -> Element {
    let mut element = Element::new(wrapper);
    for r in refs {
        element.add_leaf(item, r);
    }
    element
}

fn refs_from_element(element: &Element, item: &str) -> Vec<String> {
    element
        .children
        .iter()
        .filter(|c| c.name == item)
        .map(|c| c.text.clone())
        .collect()
}

fn settings_to_element(
    entity: &'static str,
    allowed: &[&str],
    settings: &crate::types::SettingsMap,
) -> ModelResult<Element> {
    let mut element = Element::new("other_config");
    for (key, value) in settings {
        if !allowed.contains(&key.as_str()) {
            return Err(ModelError::UnknownSetting {
                entity,
                name: key.clone(),
            });
        }
        element.add_leaf(key, value);
    }
    Ok(element)
}

fn settings_from_element(element: &Element, allowed: &[&str]) -> crate::types::SettingsMap {
    element
        .children
        .iter()
        .filter(|c| allowed.contains(&c.name.as_str()))
        .map(|c| (c.name.clone(), c.text.clone()))
        .collect()
}

fn pif_to_element(pif: &PifRef, record: &PifRecord) -> ModelResult<Element> {
    let mut element = Element::new(PIF_TAG);
    element.attrs.push(("ref".to_string(), pif.as_str().to_string()));

    element.add_leaf("uuid", &record.uuid);
    element.add_leaf("device", &record.device);
    element.add_leaf("MAC", &record.mac);
    element.add_leaf("VLAN", &record.vlan);
    element.add_leaf("management", encode_bool(record.management));
    element.add_leaf("network", record.network.as_str());
    if let Some(vlan) = &record.vlan_master_of {
        element.add_leaf("VLAN_master_of", vlan.as_str());
    }
    element.children.push(refs_to_element(
        "VLAN_slave_of",
        VLAN_TAG,
        record.vlan_slave_of.iter().map(VlanRef::as_str),
    ));
    element.children.push(refs_to_element(
        "bond_master_of",
        BOND_TAG,
        record.bond_master_of.iter().map(BondRef::as_str),
    ));
    element.children.push(refs_to_element(
        "bond_slave_of",
        BOND_TAG,
        record.bond_slave_of.iter().map(BondRef::as_str),
    ));
    element.add_leaf(
        "ip_configuration_mode",
        record.ip_configuration_mode.as_str(),
    );
    element.add_leaf("IP", &record.ip);
    element.add_leaf("netmask", &record.netmask);
    element.add_leaf("gateway", &record.gateway);
    element.add_leaf("DNS", &record.dns);
    element.children.push(settings_to_element(
        "PIF",
        PIF_SETTING_KEYS,
        &record.other_config,
    )?);
    element.add_leaf("currently_attached", encode_bool(record.currently_attached));

    Ok(element)
}

fn element_to_pif(element: &Element) -> ModelResult<(PifRef, PifRecord)> {
    let reference = element.attr("ref").ok_or_else(|| ModelError::MissingRef {
        element: PIF_TAG.to_string(),
    })?;
    let mut record = PifRecord::default();

    for child in &element.children {
        match child.name.as_str() {
            "uuid" => record.uuid = child.text.clone(),
            "device" => record.device = child.text.clone(),
            "MAC" => record.mac = child.text.clone(),
            "VLAN" => record.vlan = child.text.clone(),
            "management" => record.management = decode_bool(&child.text)?,
            "network" => record.network = NetworkRef::new(child.text.clone()),
            "VLAN_master_of" => {
                record.vlan_master_of = if child.text.is_empty() {
                    None
                } else {
                    Some(VlanRef::new(child.text.clone()))
                }
            }
            "VLAN_slave_of" => {
                record.vlan_slave_of = refs_from_element(child, VLAN_TAG)
                    .into_iter()
                    .map(VlanRef::new)
                    .collect()
            }
            "bond_master_of" => {
                record.bond_master_of = refs_from_element(child, BOND_TAG)
                    .into_iter()
                    .map(BondRef::new)
                    .collect()
            }
            "bond_slave_of" => {
                record.bond_slave_of = refs_from_element(child, BOND_TAG)
                    .into_iter()
                    .map(BondRef::new)
                    .collect()
            }
            "ip_configuration_mode" => record.ip_configuration_mode = child.text.parse()?,
            "IP" => record.ip = child.text.clone(),
            "netmask" => record.netmask = child.text.clone(),
            "gateway" => record.gateway = child.text.clone(),
            "DNS" => record.dns = child.text.clone(),
            "other_config" => {
                record.other_config = settings_from_element(child, PIF_SETTING_KEYS)
            }
            "currently_attached" => {
                // Attachment state cannot be trusted once reloaded:
                // validate the stored value but force false.
                decode_bool(&child.text)?;
                record.currently_attached = false;
            }
            _ => {}
        }
    }

    Ok((PifRef::new(reference), record))
}

fn vlan_to_element(vlan: &VlanRef, record: &VlanRecord) -> Element {
    let mut element = Element::new(VLAN_TAG);
    element
        .attrs
        .push(("ref".to_string(), vlan.as_str().to_string()));
    element.add_leaf("uuid", &record.uuid);
    element.add_leaf("tagged_PIF", record.tagged_pif.as_str());
    element.add_leaf("untagged_PIF", record.untagged_pif.as_str());
    element
}

fn element_to_vlan(element: &Element) -> ModelResult<(VlanRef, VlanRecord)> {
    let reference = element.attr("ref").ok_or_else(|| ModelError::MissingRef {
        element: VLAN_TAG.to_string(),
    })?;
    let mut record = VlanRecord::default();
    for child in &element.children {
        match child.name.as_str() {
            "uuid" => record.uuid = child.text.clone(),
            "tagged_PIF" => record.tagged_pif = PifRef::new(child.text.clone()),
            "untagged_PIF" => record.untagged_pif = PifRef::new(child.text.clone()),
            _ => {}
        }
    }
    Ok((VlanRef::new(reference), record))
}

fn bond_to_element(bond: &BondRef, record: &BondRecord) -> Element {
    let mut element = Element::new(BOND_TAG);
    element
        .attrs
        .push(("ref".to_string(), bond.as_str().to_string()));
    element.add_leaf("uuid", &record.uuid);
    element.add_leaf("master", record.master.as_str());
    element.children.push(refs_to_element(
        "slaves",
        PIF_TAG,
        record.slaves.iter().map(PifRef::as_str),
    ));
    element
}

fn element_to_bond(element: &Element) -> ModelResult<(BondRef, BondRecord)> {
    let reference = element.attr("ref").ok_or_else(|| ModelError::MissingRef {
        element: BOND_TAG.to_string(),
    })?;
    let mut record = BondRecord::default();
    for child in &element.children {
        match child.name.as_str() {
            "uuid" => record.uuid = child.text.clone(),
            "master" => record.master = PifRef::new(child.text.clone()),
            "slaves" => {
                record.slaves = refs_from_element(child, PIF_TAG)
                    .into_iter()
                    .map(PifRef::new)
                    .collect()
            }
            _ => {}
        }
    }
    Ok((BondRef::new(reference), record))
}

fn network_to_element(network: &NetworkRef, record: &NetworkRecord) -> ModelResult<Element> {
    let mut element = Element::new(NETWORK_TAG);
    element
        .attrs
        .push(("ref".to_string(), network.as_str().to_string()));
    element.add_leaf("uuid", &record.uuid);
    element.add_leaf("bridge", &record.bridge);
    if let Some(mtu) = &record.mtu {
        element.add_leaf("MTU", mtu);
    }
    element.children.push(refs_to_element(
        "PIFs",
        PIF_TAG,
        record.pifs.iter().map(PifRef::as_str),
    ));
    element.children.push(settings_to_element(
        "Network",
        NETWORK_SETTING_KEYS,
        &record.other_config,
    )?);
    Ok(element)
}

fn element_to_network(element: &Element) -> ModelResult<(NetworkRef, NetworkRecord)> {
    let reference = element.attr("ref").ok_or_else(|| ModelError::MissingRef {
        element: NETWORK_TAG.to_string(),
    })?;
    let mut record = NetworkRecord::default();
    for child in &element.children {
        match child.name.as_str() {
            "uuid" => record.uuid = child.text.clone(),
            "bridge" => record.bridge = child.text.clone(),
            "MTU" => record.mtu = Some(child.text.clone()),
            "PIFs" => {
                record.pifs = refs_from_element(child, PIF_TAG)
                    .into_iter()
                    .map(PifRef::new)
                    .collect()
            }
            "other_config" => {
                record.other_config = settings_from_element(child, NETWORK_SETTING_KEYS)
            }
            _ => {}
        }
    }
    Ok((NetworkRef::new(reference), record))
}

/// Serializes a cache to its XML snapshot form.
///
/// Entities are emitted in reference order so the output is
/// deterministic.
pub fn encode_cache(cache: &NetworkCache) -> ModelResult<String> {
    let mut root = Element::new(ROOT_TAG);

    let mut pifs: Vec<_> = cache.pifs().iter().collect();
    pifs.sort_by_key(|(r, _)| (*r).clone());
    for (r, record) in pifs {
        root.children.push(pif_to_element(r, record)?);
    }

    let mut vlans: Vec<_> = cache.vlans().iter().collect();
    vlans.sort_by_key(|(r, _)| (*r).clone());
    for (r, record) in vlans {
        root.children.push(vlan_to_element(r, record));
    }

    let mut bonds: Vec<_> = cache.bonds().iter().collect();
    bonds.sort_by_key(|(r, _)| (*r).clone());
    for (r, record) in bonds {
        root.children.push(bond_to_element(r, record));
    }

    let mut networks: Vec<_> = cache.networks().iter().collect();
    networks.sort_by_key(|(r, _)| (*r).clone());
    for (r, record) in networks {
        root.children.push(network_to_element(r, record)?);
    }

    serialize(&root)
}

/// Parses an XML snapshot into a cache.
///
/// The root element must carry the snapshot tag; each child must be one
/// of the four entity tags. Unknown fields inside an entity are
/// skipped, but an unknown entity tag is a consistency error.
pub fn decode_cache(content: &str) -> ModelResult<NetworkCache> {
    let root = parse_tree(content)?;
    if root.name != ROOT_TAG {
        return Err(ModelError::UnknownElement { name: root.name });
    }

    let mut pifs = HashMap::new();
    let mut vlans = HashMap::new();
    let mut bonds = HashMap::new();
    let mut networks = HashMap::new();

    for child in &root.children {
        match child.name.as_str() {
            PIF_TAG => {
                let (r, record) = element_to_pif(child)?;
                pifs.insert(r, record);
            }
            VLAN_TAG => {
                let (r, record) = element_to_vlan(child)?;
                vlans.insert(r, record);
            }
            BOND_TAG => {
                let (r, record) = element_to_bond(child)?;
                bonds.insert(r, record);
            }
            NETWORK_TAG => {
                let (r, record) = element_to_network(child)?;
                networks.insert(r, record);
            }
            other => {
                return Err(ModelError::UnknownElement {
                    name: other.to_string(),
                })
            }
        }
    }

    Ok(NetworkCache::from_records(pifs, vlans, bonds, networks))
}
