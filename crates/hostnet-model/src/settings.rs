//! Resolution of soft-validated device settings.
//!
//! MTU overrides and ethtool settings come from free-form key/value maps
//! the management plane does not validate. Invalid values here are
//! recoverable (the device falls back to its defaults), so they are
//! logged and skipped rather than failing the reconfiguration.

use tracing::warn;

use crate::types::{NetworkRecord, SettingsMap};

/// MTU assumed when the management plane predates the network MTU field.
pub const DEFAULT_MTU: &str = "1500";

/// Computes the effective MTU for a network.
///
/// Starts from the network's own MTU (defaulting to 1500 when the
/// management plane omitted it) and applies an `mtu` override from
/// `settings` when present and parseable. `label` names the device in
/// log messages.
pub fn mtu_setting(network: &NetworkRecord, label: &str, settings: &SettingsMap) -> String {
    let mut mtu = network
        .mtu
        .clone()
        .unwrap_or_else(|| DEFAULT_MTU.to_string());

    if let Some(override_mtu) = settings.get("mtu") {
        if override_mtu.parse::<u32>().is_ok() {
            mtu = override_mtu.clone();
        } else {
            warn!(
                device = %label,
                mtu = %override_mtu,
                "Invalid MTU override, ignoring"
            );
        }
    }

    mtu
}

/// Offload toggles configurable through `ethtool -K`.
const ETHTOOL_OFFLOADS: &[&str] = &["rx", "tx", "sg", "tso", "ufo", "gso"];

/// Resolves ethtool command-line settings from a settings map.
///
/// Returns `(settings, offloads)`: the first list feeds `ethtool -s`
/// (autoneg, speed, duplex), the second `ethtool -K` (per-feature
/// on/off). Each value is validated against its allowed set; invalid
/// values are logged and dropped.
pub fn ethtool_settings(settings: &SettingsMap) -> (Vec<(String, String)>, Vec<(String, String)>) {
    let mut opts = Vec::new();
    let mut offloads = Vec::new();

    if let Some(autoneg) = settings.get("ethtool-autoneg") {
        match parse_switch(autoneg) {
            Some(value) => opts.push(("autoneg".to_string(), value.to_string())),
            None => warn!(value = %autoneg, "Invalid ethtool-autoneg setting, ignoring"),
        }
    }
    if let Some(speed) = settings.get("ethtool-speed") {
        if speed.parse::<u32>().is_ok() {
            opts.push(("speed".to_string(), speed.clone()));
        } else {
            warn!(value = %speed, "Invalid ethtool-speed setting, ignoring");
        }
    }
    if let Some(duplex) = settings.get("ethtool-duplex") {
        if duplex == "half" || duplex == "full" {
            opts.push(("duplex".to_string(), duplex.clone()));
        } else {
            warn!(value = %duplex, "Invalid ethtool-duplex setting, ignoring");
        }
    }

    for feature in ETHTOOL_OFFLOADS {
        let key = format!("ethtool-{}", feature);
        if let Some(value) = settings.get(&key) {
            match parse_switch(value) {
                Some(value) => offloads.push((feature.to_string(), value.to_string())),
                None => warn!(setting = %key, value = %value, "Invalid offload setting, ignoring"),
            }
        }
    }

    (opts, offloads)
}

/// Maps on/true/off/false spellings to ethtool's on/off.
fn parse_switch(value: &str) -> Option<&'static str> {
    match value {
        "on" | "true" => Some("on"),
        "off" | "false" => Some("off"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> SettingsMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mtu_defaults_when_network_omits_it() {
        let network = NetworkRecord::default();
        assert_eq!(mtu_setting(&network, "xenbr0", &SettingsMap::new()), "1500");
    }

    #[test]
    fn test_mtu_uses_network_value() {
        let network = NetworkRecord {
            mtu: Some("9000".to_string()),
            ..NetworkRecord::default()
        };
        assert_eq!(mtu_setting(&network, "xenbr0", &SettingsMap::new()), "9000");
    }

    #[test]
    fn test_mtu_override_takes_precedence() {
        let network = NetworkRecord {
            mtu: Some("1500".to_string()),
            ..NetworkRecord::default()
        };
        let overrides = settings(&[("mtu", "9000")]);
        assert_eq!(mtu_setting(&network, "xenbr0", &overrides), "9000");
    }

    #[test]
    fn test_invalid_mtu_override_is_ignored() {
        let network = NetworkRecord::default();
        let overrides = settings(&[("mtu", "jumbo")]);
        assert_eq!(mtu_setting(&network, "xenbr0", &overrides), "1500");
    }

    #[test]
    fn test_ethtool_speed_duplex_autoneg() {
        let map = settings(&[
            ("ethtool-speed", "1000"),
            ("ethtool-duplex", "full"),
            ("ethtool-autoneg", "off"),
        ]);
        let (opts, offloads) = ethtool_settings(&map);
        assert!(opts.contains(&("speed".to_string(), "1000".to_string())));
        assert!(opts.contains(&("duplex".to_string(), "full".to_string())));
        assert!(opts.contains(&("autoneg".to_string(), "off".to_string())));
        assert!(offloads.is_empty());
    }

    #[test]
    fn test_ethtool_invalid_values_are_dropped() {
        let map = settings(&[
            ("ethtool-speed", "fast"),
            ("ethtool-duplex", "both"),
            ("ethtool-rx", "maybe"),
        ]);
        let (opts, offloads) = ethtool_settings(&map);
        assert!(opts.is_empty());
        assert!(offloads.is_empty());
    }

    #[test]
    fn test_ethtool_offload_spellings() {
        let map = settings(&[
            ("ethtool-rx", "on"),
            ("ethtool-tx", "false"),
            ("ethtool-gso", "true"),
        ]);
        let (_, offloads) = ethtool_settings(&map);
        assert!(offloads.contains(&("rx".to_string(), "on".to_string())));
        assert!(offloads.contains(&("tx".to_string(), "off".to_string())));
        assert!(offloads.contains(&("gso".to_string(), "on".to_string())));
    }
}
