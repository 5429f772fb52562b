//! Shell command builders for the datapath backends.

use hostnet_common::shell::{
    self, BRCTL_CMD, ETHTOOL_CMD, IFDOWN_CMD, IFUP_CMD, IP_CMD, OVS_VSCTL_CMD, VCONFIG_CMD,
};

/// Build bridge creation command.
pub fn build_add_bridge_cmd(bridge: &str) -> String {
    format!("{} addbr {}", BRCTL_CMD, shell::shellquote(bridge))
}

/// Build bridge deletion command.
pub fn build_del_bridge_cmd(bridge: &str) -> String {
    format!("{} delbr {}", BRCTL_CMD, shell::shellquote(bridge))
}

/// Build command zeroing the bridge forwarding delay.
pub fn build_set_bridge_fd_cmd(bridge: &str) -> String {
    format!("{} setfd {} 0", BRCTL_CMD, shell::shellquote(bridge))
}

/// Build command disabling STP on a bridge.
pub fn build_stp_off_cmd(bridge: &str) -> String {
    format!("{} stp {} off", BRCTL_CMD, shell::shellquote(bridge))
}

/// Build command enslaving a device to a bridge.
pub fn build_add_bridge_port_cmd(bridge: &str, device: &str) -> String {
    format!(
        "{} addif {} {}",
        BRCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(device)
    )
}

/// Build command releasing a device from a bridge.
pub fn build_del_bridge_port_cmd(bridge: &str, device: &str) -> String {
    format!(
        "{} delif {} {}",
        BRCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(device)
    )
}

/// Build link-up command.
pub fn build_link_up_cmd(device: &str) -> String {
    format!("{} link set {} up", IP_CMD, shell::shellquote(device))
}

/// Build link-down command.
pub fn build_link_down_cmd(device: &str) -> String {
    format!("{} link set {} down", IP_CMD, shell::shellquote(device))
}

/// Build MTU-setting command.
pub fn build_set_mtu_cmd(device: &str, mtu: &str) -> String {
    format!(
        "{} link set {} mtu {}",
        IP_CMD,
        shell::shellquote(device),
        shell::shellquote(mtu)
    )
}

/// Build VLAN device creation command.
pub fn build_add_vlan_dev_cmd(parent: &str, tag: &str) -> String {
    format!(
        "{} add {} {}",
        VCONFIG_CMD,
        shell::shellquote(parent),
        shell::shellquote(tag)
    )
}

/// Build VLAN device removal command.
pub fn build_del_vlan_dev_cmd(device: &str) -> String {
    format!("{} rem {}", VCONFIG_CMD, shell::shellquote(device))
}

/// Build `ethtool -s` command from resolved settings pairs.
pub fn build_ethtool_opts_cmd(device: &str, opts: &[(String, String)]) -> String {
    let mut cmd = format!("{} -s {}", ETHTOOL_CMD, shell::shellquote(device));
    for (key, value) in opts {
        cmd.push_str(&format!(" {} {}", key, shell::shellquote(value)));
    }
    cmd
}

/// Build `ethtool -K` command from resolved offload pairs.
pub fn build_ethtool_offload_cmd(device: &str, offloads: &[(String, String)]) -> String {
    let mut cmd = format!("{} -K {}", ETHTOOL_CMD, shell::shellquote(device));
    for (feature, value) in offloads {
        cmd.push_str(&format!(" {} {}", feature, value));
    }
    cmd
}

/// Build `ifup` command for the IP-bearing device.
pub fn build_ifup_cmd(device: &str) -> String {
    format!("{} {}", IFUP_CMD, shell::shellquote(device))
}

/// Build `ifdown` command for the IP-bearing device.
pub fn build_ifdown_cmd(device: &str) -> String {
    format!("{} {}", IFDOWN_CMD, shell::shellquote(device))
}

/// Build OVS bridge creation command.
pub fn build_ovs_add_bridge_cmd(bridge: &str) -> String {
    format!(
        "{} --may-exist add-br {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge)
    )
}

/// Build OVS fake-bridge creation command for a VLAN.
pub fn build_ovs_add_fake_bridge_cmd(bridge: &str, parent: &str, tag: &str) -> String {
    format!(
        "{} --may-exist add-br {} {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(parent),
        shell::shellquote(tag)
    )
}

/// Build OVS bridge deletion command.
pub fn build_ovs_del_bridge_cmd(bridge: &str) -> String {
    format!(
        "{} -- --if-exists del-br {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge)
    )
}

/// Build OVS port addition command.
pub fn build_ovs_add_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} --may-exist add-port {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(port)
    )
}

/// Build OVS port removal command.
pub fn build_ovs_del_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} -- --if-exists del-port {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(port)
    )
}

/// Build OVS bonded-port creation command.
pub fn build_ovs_add_bond_cmd(bridge: &str, bond: &str, slaves: &[String]) -> String {
    let mut cmd = format!(
        "{} --may-exist --fake-iface add-bond {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(bond)
    );
    for slave in slaves {
        cmd.push_str(&format!(" {}", shell::shellquote(slave)));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_bridge_cmds() {
        assert_eq!(build_add_bridge_cmd("xenbr0"), "/usr/sbin/brctl addbr \"xenbr0\"");
        assert_eq!(build_del_bridge_cmd("xenbr0"), "/usr/sbin/brctl delbr \"xenbr0\"");
        assert!(build_set_bridge_fd_cmd("xenbr0").ends_with("setfd \"xenbr0\" 0"));
        assert!(build_stp_off_cmd("xenbr0").ends_with("stp \"xenbr0\" off"));
    }

    #[test]
    fn test_build_bridge_port_cmds() {
        let cmd = build_add_bridge_port_cmd("xenbr0", "eth0");
        assert!(cmd.contains("addif \"xenbr0\" \"eth0\""));
        let cmd = build_del_bridge_port_cmd("xenbr0", "eth0");
        assert!(cmd.contains("delif \"xenbr0\" \"eth0\""));
    }

    #[test]
    fn test_build_link_cmds() {
        assert_eq!(build_link_up_cmd("eth0"), "/sbin/ip link set \"eth0\" up");
        assert_eq!(build_link_down_cmd("eth0"), "/sbin/ip link set \"eth0\" down");
        assert_eq!(
            build_set_mtu_cmd("eth0", "9000"),
            "/sbin/ip link set \"eth0\" mtu \"9000\""
        );
    }

    #[test]
    fn test_build_vlan_dev_cmds() {
        assert_eq!(
            build_add_vlan_dev_cmd("eth0", "100"),
            "/sbin/vconfig add \"eth0\" \"100\""
        );
        assert_eq!(
            build_del_vlan_dev_cmd("eth0.100"),
            "/sbin/vconfig rem \"eth0.100\""
        );
    }

    #[test]
    fn test_build_ethtool_cmds() {
        let opts = vec![
            ("speed".to_string(), "1000".to_string()),
            ("duplex".to_string(), "full".to_string()),
        ];
        let cmd = build_ethtool_opts_cmd("eth0", &opts);
        assert!(cmd.starts_with("/sbin/ethtool -s \"eth0\""));
        assert!(cmd.contains("speed \"1000\""));
        assert!(cmd.contains("duplex \"full\""));

        let offloads = vec![("rx".to_string(), "off".to_string())];
        let cmd = build_ethtool_offload_cmd("eth0", &offloads);
        assert_eq!(cmd, "/sbin/ethtool -K \"eth0\" rx off");
    }

    #[test]
    fn test_build_ifup_ifdown_cmds() {
        assert_eq!(build_ifup_cmd("xenbr0"), "/sbin/ifup \"xenbr0\"");
        assert_eq!(build_ifdown_cmd("xenbr0"), "/sbin/ifdown \"xenbr0\"");
    }

    #[test]
    fn test_build_ovs_cmds() {
        assert_eq!(
            build_ovs_add_bridge_cmd("xenbr0"),
            "/usr/bin/ovs-vsctl --may-exist add-br \"xenbr0\""
        );
        assert_eq!(
            build_ovs_add_fake_bridge_cmd("xapi1", "xenbr0", "100"),
            "/usr/bin/ovs-vsctl --may-exist add-br \"xapi1\" \"xenbr0\" \"100\""
        );
        assert_eq!(
            build_ovs_del_bridge_cmd("xenbr0"),
            "/usr/bin/ovs-vsctl -- --if-exists del-br \"xenbr0\""
        );
        assert!(build_ovs_add_port_cmd("xenbr0", "eth0").contains("add-port \"xenbr0\" \"eth0\""));
        assert!(build_ovs_del_port_cmd("xenbr0", "eth0").contains("del-port \"xenbr0\" \"eth0\""));
    }

    #[test]
    fn test_build_ovs_add_bond_cmd() {
        let slaves = vec!["eth2".to_string(), "eth3".to_string()];
        let cmd = build_ovs_add_bond_cmd("xapi2", "bond0", &slaves);
        assert!(cmd.contains("add-bond \"xapi2\" \"bond0\" \"eth2\" \"eth3\""));
        assert!(cmd.contains("--fake-iface"));
    }

    #[test]
    fn test_quoting_blocks_injection() {
        let cmd = build_add_bridge_port_cmd("xenbr0", "eth0`reboot`");
        assert!(cmd.contains("\\`reboot\\`"));
    }
}
