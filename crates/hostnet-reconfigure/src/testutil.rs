//! Shared test fixtures for the reconfiguration tool.

use std::collections::HashMap;

use hostnet_model::types::{IpConfigMode, SettingsMap};
use hostnet_model::{
    BondRecord, BondRef, NetworkCache, NetworkRecord, NetworkRef, PifRecord, PifRef, VlanRecord,
    VlanRef,
};

/// A host with a management PIF on `xenbr0`, a static-IP PIF on
/// `xenbr1`, a VLAN 100 PIF on `xapi1` and a two-slave bond on `xapi2`.
pub(crate) fn fixture_cache() -> NetworkCache {
    let mut pifs = HashMap::new();
    let mut vlans = HashMap::new();
    let mut bonds = HashMap::new();
    let mut networks = HashMap::new();

    pifs.insert(
        PifRef::new("OpaqueRef:pif-eth0"),
        PifRecord {
            uuid: "pif-eth0-uuid".to_string(),
            device: "eth0".to_string(),
            mac: "aa:bb:cc:dd:ee:00".to_string(),
            management: true,
            network: NetworkRef::new("OpaqueRef:net0"),
            vlan_slave_of: vec![VlanRef::new("OpaqueRef:vlan100")],
            ip_configuration_mode: IpConfigMode::Dhcp,
            ..PifRecord::default()
        },
    );
    networks.insert(
        NetworkRef::new("OpaqueRef:net0"),
        NetworkRecord {
            uuid: "net0-uuid".to_string(),
            bridge: "xenbr0".to_string(),
            mtu: Some("1500".to_string()),
            pifs: vec![PifRef::new("OpaqueRef:pif-eth0")],
            ..NetworkRecord::default()
        },
    );

    pifs.insert(
        PifRef::new("OpaqueRef:pif-eth1"),
        PifRecord {
            uuid: "pif-static-uuid".to_string(),
            device: "eth1".to_string(),
            mac: "aa:bb:cc:dd:ee:01".to_string(),
            network: NetworkRef::new("OpaqueRef:net-static"),
            ip_configuration_mode: IpConfigMode::Static,
            ip: "10.0.0.2".to_string(),
            netmask: "255.255.255.0".to_string(),
            gateway: "10.0.0.1".to_string(),
            dns: "10.0.0.53,10.0.0.54".to_string(),
            ..PifRecord::default()
        },
    );
    let mut static_net_config = SettingsMap::new();
    static_net_config.insert(
        "static-routes".to_string(),
        "172.16.0.0/16/10.0.0.254".to_string(),
    );
    networks.insert(
        NetworkRef::new("OpaqueRef:net-static"),
        NetworkRecord {
            uuid: "net-static-uuid".to_string(),
            bridge: "xenbr1".to_string(),
            mtu: Some("1500".to_string()),
            pifs: vec![PifRef::new("OpaqueRef:pif-eth1")],
            other_config: static_net_config,
        },
    );

    pifs.insert(
        PifRef::new("OpaqueRef:pif-eth0.100"),
        PifRecord {
            uuid: "pif-vlan-uuid".to_string(),
            device: "eth0".to_string(),
            vlan: "100".to_string(),
            network: NetworkRef::new("OpaqueRef:net1"),
            vlan_master_of: Some(VlanRef::new("OpaqueRef:vlan100")),
            ..PifRecord::default()
        },
    );
    vlans.insert(
        VlanRef::new("OpaqueRef:vlan100"),
        VlanRecord {
            uuid: "vlan100-uuid".to_string(),
            tagged_pif: PifRef::new("OpaqueRef:pif-eth0"),
            untagged_pif: PifRef::new("OpaqueRef:pif-eth0.100"),
        },
    );
    networks.insert(
        NetworkRef::new("OpaqueRef:net1"),
        NetworkRecord {
            uuid: "net1-uuid".to_string(),
            bridge: "xapi1".to_string(),
            pifs: vec![PifRef::new("OpaqueRef:pif-eth0.100")],
            ..NetworkRecord::default()
        },
    );

    pifs.insert(
        PifRef::new("OpaqueRef:pif-bond0"),
        PifRecord {
            uuid: "pif-bond0-uuid".to_string(),
            device: "bond0".to_string(),
            network: NetworkRef::new("OpaqueRef:net2"),
            bond_master_of: vec![BondRef::new("OpaqueRef:bond0")],
            ..PifRecord::default()
        },
    );
    for (refname, device, uuid) in [
        ("OpaqueRef:pif-eth2", "eth2", "pif-eth2-uuid"),
        ("OpaqueRef:pif-eth3", "eth3", "pif-eth3-uuid"),
    ] {
        pifs.insert(
            PifRef::new(refname),
            PifRecord {
                uuid: uuid.to_string(),
                device: device.to_string(),
                network: NetworkRef::new("OpaqueRef:net2"),
                bond_slave_of: vec![BondRef::new("OpaqueRef:bond0")],
                ..PifRecord::default()
            },
        );
    }
    bonds.insert(
        BondRef::new("OpaqueRef:bond0"),
        BondRecord {
            uuid: "bond0-uuid".to_string(),
            master: PifRef::new("OpaqueRef:pif-bond0"),
            slaves: vec![
                PifRef::new("OpaqueRef:pif-eth2"),
                PifRef::new("OpaqueRef:pif-eth3"),
            ],
        },
    );
    networks.insert(
        NetworkRef::new("OpaqueRef:net2"),
        NetworkRecord {
            uuid: "net2-uuid".to_string(),
            bridge: "xapi2".to_string(),
            pifs: vec![PifRef::new("OpaqueRef:pif-bond0")],
            ..NetworkRecord::default()
        },
    );

    NetworkCache::from_records(pifs, vlans, bonds, networks)
}
