//! Interface configuration file content.
//!
//! Builders for the `ifcfg-*` and `route-*` files staged through
//! configuration transactions. Content is returned as lines; the caller
//! owns the transaction they are written into.

use std::path::{Path, PathBuf};
use tracing::warn;

use hostnet_model::settings;
use hostnet_model::types::{IpConfigMode, SettingsMap};
use hostnet_model::{ModelResult, NetworkCache, PifRef};

/// Default directory holding interface configuration files.
pub const NETWORK_SCRIPTS_DIR: &str = "/etc/sysconfig/network-scripts";

/// Path of the `ifcfg-*` file for a device, under `dir`.
pub fn ifcfg_path(dir: &Path, device: &str) -> PathBuf {
    dir.join(format!("ifcfg-{}", device))
}

/// Path of the `route-*` file for a device, under `dir`.
pub fn route_path(dir: &Path, device: &str) -> PathBuf {
    dir.join(format!("route-{}", device))
}

/// Common header of every generated configuration file.
pub fn header_lines(device: &str) -> Vec<String> {
    vec![
        "# Autogenerated by interface-reconfigure. Do not edit.".to_string(),
        format!("DEVICE={}", device),
        "ONBOOT=no".to_string(),
    ]
}

/// IP configuration lines for the IP-bearing device of a PIF.
///
/// Covers BOOTPROTO, static addressing, DNS and domain search entries,
/// and the effective MTU.
pub fn ipdev_lines(cache: &NetworkCache, pif: &PifRef) -> ModelResult<Vec<String>> {
    let record = cache.pif(pif)?;
    let network = cache.network(&record.network)?;
    let ipdev = cache.pif_ipdev_name(pif)?;
    let mut lines = Vec::new();

    match record.ip_configuration_mode {
        IpConfigMode::Dhcp => {
            lines.push("BOOTPROTO=dhcp".to_string());
            lines.push("PERSISTENT_DHCLIENT=yes".to_string());
        }
        IpConfigMode::Static => {
            lines.push("BOOTPROTO=none".to_string());
            lines.push(format!("IPADDR={}", record.ip));
            lines.push(format!("NETMASK={}", record.netmask));
            if !record.gateway.is_empty() {
                lines.push(format!("GATEWAY={}", record.gateway));
            }
        }
        IpConfigMode::None => {
            lines.push("BOOTPROTO=none".to_string());
        }
    }

    if let Some(peerdns) = record.other_config.get("peerdns") {
        lines.push(format!("PEERDNS={}", peerdns));
    }
    if !record.dns.is_empty() {
        for (i, server) in record.dns.split(',').enumerate() {
            lines.push(format!("DNS{}={}", i + 1, server.trim()));
        }
    }
    if let Some(domain) = record.other_config.get("domain") {
        lines.push(format!("DOMAIN={}", domain));
    }

    let mtu = settings::mtu_setting(network, &ipdev, &record.other_config);
    lines.push(format!("MTU={}", mtu));

    Ok(lines)
}

/// Configuration lines for a raw device sitting under a datapath.
pub fn datapath_device_lines(device: &str, mtu: &str) -> Vec<String> {
    let mut lines = header_lines(device);
    lines.push("BOOTPROTO=none".to_string());
    lines.push(format!("MTU={}", mtu));
    lines
}

/// Configuration lines for a bond slave device.
pub fn bond_slave_lines(device: &str, master: &str) -> Vec<String> {
    let mut lines = header_lines(device);
    lines.push("BOOTPROTO=none".to_string());
    lines.push(format!("MASTER={}", master));
    lines.push("SLAVE=yes".to_string());
    lines
}

/// The `BONDING_OPTS` line for a bond master, from its `bond-*`
/// settings with conventional defaults.
pub fn bonding_opts_line(settings: &SettingsMap) -> String {
    let mode = settings
        .get("bond-mode")
        .map(String::as_str)
        .unwrap_or("active-backup");
    let miimon = settings
        .get("bond-miimon")
        .map(String::as_str)
        .unwrap_or("100");
    let downdelay = settings
        .get("bond-downdelay")
        .map(String::as_str)
        .unwrap_or("200");
    let updelay = settings
        .get("bond-updelay")
        .map(String::as_str)
        .unwrap_or("31000");
    format!(
        "BONDING_OPTS=\"mode={} miimon={} downdelay={} updelay={}\"",
        mode, miimon, downdelay, updelay
    )
}

/// Route file lines from a `static-routes` setting.
///
/// The setting holds comma-separated `destination/prefixlen/gateway`
/// entries; malformed entries are logged and skipped.
pub fn static_route_lines(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split('/').collect();
        match parts.as_slice() {
            [destination, prefixlen, gateway]
                if prefixlen.parse::<u8>().is_ok() && !destination.is_empty() =>
            {
                lines.push(format!("{}/{} via {}", destination, prefixlen, gateway));
            }
            _ => {
                warn!(entry = %entry, "Invalid static route entry, ignoring");
            }
        }
    }
    lines
}

/// Bonding parameter lines for a bond master device.
pub fn bond_master_lines(device: &str, mtu: &str, settings: &SettingsMap) -> Vec<String> {
    let mut lines = header_lines(device);
    lines.push("BOOTPROTO=none".to_string());
    lines.push(bonding_opts_line(settings));
    lines.push(format!("MTU={}", mtu));
    lines
}

/// Marker lines declaring a VLAN device.
pub fn vlan_device_lines(device: &str, mtu: &str) -> Vec<String> {
    let mut lines = header_lines(device);
    lines.push("BOOTPROTO=none".to_string());
    lines.push("VLAN=yes".to_string());
    lines.push(format!("MTU={}", mtu));
    lines
}
