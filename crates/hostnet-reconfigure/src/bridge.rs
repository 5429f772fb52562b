//! Linux-bridge datapath backend.
//!
//! The IP-bearing device is the bridge itself; the raw device stack
//! (physical NIC, VLAN device, or bond) is enslaved to it. Device
//! configuration files are staged as children of the ipdev transaction;
//! device state is driven through `brctl`/`ip`/`vconfig`.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use hostnet_common::{shell, ConfigTransaction};
use hostnet_model::settings;
use hostnet_model::{NetworkCache, PifRef};

use crate::commands::{
    build_add_bridge_cmd, build_add_bridge_port_cmd, build_add_vlan_dev_cmd, build_del_bridge_cmd,
    build_del_bridge_port_cmd, build_del_vlan_dev_cmd, build_ethtool_offload_cmd,
    build_ethtool_opts_cmd, build_ifup_cmd, build_link_down_cmd, build_link_up_cmd,
    build_set_bridge_fd_cmd, build_set_mtu_cmd, build_stp_off_cmd,
};
use crate::datapath::Datapath;
use crate::error::ReconfigureResult;
use crate::ifcfg;

/// Linux-bridge backend for one PIF.
pub struct BridgeDatapath<'a> {
    cache: &'a NetworkCache,
    pif: PifRef,
    scripts_dir: PathBuf,

    /// Mock mode for testing
    #[cfg(test)]
    mock_mode: bool,

    /// Captured commands in mock mode
    #[cfg(test)]
    captured_commands: Vec<String>,
}

impl<'a> BridgeDatapath<'a> {
    /// Creates a backend over the given PIF.
    pub fn new(cache: &'a NetworkCache, pif: PifRef, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            pif,
            scripts_dir: scripts_dir.into(),
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            captured_commands: Vec::new(),
        }
    }

    /// Enables mock mode for testing
    #[cfg(test)]
    pub fn with_mock_mode(mut self) -> Self {
        self.mock_mode = true;
        self
    }

    /// Gets captured commands (for testing)
    #[cfg(test)]
    pub fn captured_commands(&self) -> &[String] {
        &self.captured_commands
    }

    /// Execute a must-succeed command (with mock mode support)
    async fn exec(&mut self, cmd: &str) -> ReconfigureResult<()> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            return Ok(());
        }

        shell::exec_or_throw(cmd).await?;
        Ok(())
    }

    /// Execute a best-effort command; failure is logged, not surfaced.
    async fn exec_best_effort(&mut self, cmd: &str) {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            return;
        }

        let _ = shell::exec(cmd).await;
    }

    fn bridge_name(&self) -> ReconfigureResult<String> {
        Ok(self.cache.pif_ipdev_name(&self.pif)?)
    }

    fn effective_mtu(&self) -> ReconfigureResult<String> {
        let record = self.cache.pif(&self.pif)?;
        let network = self.cache.network(&record.network)?;
        let ipdev = self.cache.pif_ipdev_name(&self.pif)?;
        Ok(settings::mtu_setting(network, &ipdev, &record.other_config))
    }

    /// The physical devices carrying this datapath: the bond slaves for
    /// a bond PIF, the raw device otherwise.
    fn physical_devices(&self) -> ReconfigureResult<Vec<String>> {
        if self.cache.pif_is_bond(&self.pif)? {
            let mut devices = Vec::new();
            for slave in self.cache.pif_get_bond_slaves(&self.pif)? {
                devices.push(self.cache.pif(&slave)?.device.clone());
            }
            Ok(devices)
        } else {
            Ok(vec![self.cache.pif(&self.pif)?.device.clone()])
        }
    }
}

#[async_trait]
impl Datapath for BridgeDatapath<'_> {
    fn configure_ipdev(&self, txn: &mut ConfigTransaction) -> ReconfigureResult<()> {
        txn.write_line("TYPE=Bridge")?;
        txn.write_line("DELAY=0")?;
        txn.write_line("STP=off")?;
        Ok(())
    }

    fn preconfigure(&mut self, parent: &mut ConfigTransaction) -> ReconfigureResult<()> {
        let record = self.cache.pif(&self.pif)?;
        let network = self.cache.network(&record.network)?;
        let mtu = self.effective_mtu()?;
        let netdev = self.cache.pif_netdev_name(&self.pif)?;

        let lines = if self.cache.pif_is_vlan(&self.pif)? {
            ifcfg::vlan_device_lines(&netdev, &mtu)
        } else if self.cache.pif_is_bond(&self.pif)? {
            // Bond slaves get their own files alongside the master's.
            for slave in self.cache.pif_get_bond_slaves(&self.pif)? {
                let slave_dev = self.cache.pif(&slave)?.device.clone();
                let mut txn =
                    ConfigTransaction::new(ifcfg::ifcfg_path(&self.scripts_dir, &slave_dev))?;
                for line in ifcfg::bond_slave_lines(&slave_dev, &netdev) {
                    txn.write_line(&line)?;
                }
                txn.close()?;
                parent.attach_child(txn);
            }
            ifcfg::bond_master_lines(&netdev, &mtu, &record.other_config)
        } else {
            ifcfg::datapath_device_lines(&netdev, &mtu)
        };

        let mut txn = ConfigTransaction::new(ifcfg::ifcfg_path(&self.scripts_dir, &netdev))?;
        for line in &lines {
            txn.write_line(line)?;
        }
        txn.close()?;
        parent.attach_child(txn);

        if let Some(raw) = network.other_config.get("static-routes") {
            let routes = ifcfg::static_route_lines(raw);
            if !routes.is_empty() {
                let bridge = self.bridge_name()?;
                let mut txn =
                    ConfigTransaction::new(ifcfg::route_path(&self.scripts_dir, &bridge))?;
                for line in &routes {
                    txn.write_line(line)?;
                }
                txn.close()?;
                parent.attach_child(txn);
            }
        }

        debug!(pif = %self.pif, "Staged bridge datapath configuration");
        Ok(())
    }

    async fn bring_down_existing(&mut self) -> ReconfigureResult<()> {
        // An old bridge of the same name may still hold the device; the
        // calls fail harmlessly when it does not exist.
        let bridge = self.bridge_name()?;
        self.exec_best_effort(&build_link_down_cmd(&bridge)).await;
        self.exec_best_effort(&build_del_bridge_cmd(&bridge)).await;
        Ok(())
    }

    async fn configure(&mut self) -> ReconfigureResult<()> {
        let bridge = self.bridge_name()?;
        let netdev = self.cache.pif_netdev_name(&self.pif)?;
        let record = self.cache.pif(&self.pif)?.clone();
        let mtu = self.effective_mtu()?;
        let is_vlan = self.cache.pif_is_vlan(&self.pif)?;
        let is_bond = self.cache.pif_is_bond(&self.pif)?;
        let physical = self.physical_devices()?;

        self.exec(&build_add_bridge_cmd(&bridge)).await?;
        self.exec(&build_set_bridge_fd_cmd(&bridge)).await?;
        self.exec(&build_stp_off_cmd(&bridge)).await?;

        let (opts, offloads) = settings::ethtool_settings(&record.other_config);
        for device in &physical {
            if !opts.is_empty() {
                self.exec_best_effort(&build_ethtool_opts_cmd(device, &opts))
                    .await;
            }
            if !offloads.is_empty() {
                self.exec_best_effort(&build_ethtool_offload_cmd(device, &offloads))
                    .await;
            }
        }

        if is_vlan {
            self.exec(&build_link_up_cmd(&record.device)).await?;
            self.exec(&build_add_vlan_dev_cmd(&record.device, &record.vlan))
                .await?;
        } else if is_bond {
            for device in &physical {
                self.exec(&build_link_up_cmd(device)).await?;
            }
            // The bond itself assembles from the staged MASTER/SLAVE
            // files.
            self.exec(&build_ifup_cmd(&netdev)).await?;
        }

        self.exec(&build_set_mtu_cmd(&netdev, &mtu)).await?;
        self.exec(&build_link_up_cmd(&netdev)).await?;
        self.exec(&build_add_bridge_port_cmd(&bridge, &netdev))
            .await?;

        info!(bridge = %bridge, netdev = %netdev, "Configured bridge datapath");
        Ok(())
    }

    async fn post(&mut self) -> ReconfigureResult<()> {
        // Nothing was displaced in bring_down_existing that survives.
        debug!(pif = %self.pif, "Bridge datapath post-configuration complete");
        Ok(())
    }

    async fn bring_down(&mut self) -> ReconfigureResult<()> {
        let bridge = self.bridge_name()?;
        let netdev = self.cache.pif_netdev_name(&self.pif)?;
        let is_vlan = self.cache.pif_is_vlan(&self.pif)?;
        let is_bond = self.cache.pif_is_bond(&self.pif)?;
        let physical = self.physical_devices()?;

        self.exec_best_effort(&build_del_bridge_port_cmd(&bridge, &netdev))
            .await;
        self.exec(&build_del_bridge_cmd(&bridge)).await?;
        self.exec(&build_link_down_cmd(&netdev)).await?;
        if is_vlan {
            self.exec(&build_del_vlan_dev_cmd(&netdev)).await?;
        }
        if is_bond {
            for device in &physical {
                self.exec(&build_link_down_cmd(device)).await?;
            }
        }

        info!(bridge = %bridge, netdev = %netdev, "Brought down bridge datapath");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture_cache;
    use hostnet_common::TxnState;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_configure_plain_pif() {
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, "/tmp/unused").with_mock_mode();

        dp.configure().await.unwrap();

        let cmds = dp.captured_commands();
        assert!(cmds.iter().any(|c| c.contains("addbr \"xenbr0\"")));
        assert!(cmds.iter().any(|c| c.contains("stp \"xenbr0\" off")));
        assert!(cmds.iter().any(|c| c.contains("addif \"xenbr0\" \"eth0\"")));
        // Configure never brings the IP device (the bridge) up.
        assert!(!cmds.iter().any(|c| c.contains("set \"xenbr0\" up")));

        // Enslave comes after bridge creation.
        let addbr = cmds.iter().position(|c| c.contains("addbr")).unwrap();
        let addif = cmds.iter().position(|c| c.contains("addif")).unwrap();
        assert!(addbr < addif);
    }

    #[tokio::test]
    async fn test_configure_vlan_pif_creates_vlan_device() {
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-vlan-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, "/tmp/unused").with_mock_mode();

        dp.configure().await.unwrap();

        let cmds = dp.captured_commands();
        assert!(cmds.iter().any(|c| c.contains("vconfig add \"eth0\" \"100\"")));
        assert!(cmds
            .iter()
            .any(|c| c.contains("addif \"xapi1\" \"eth0.100\"")));
    }

    #[tokio::test]
    async fn test_configure_bond_pif_brings_up_slaves() {
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-bond0-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, "/tmp/unused").with_mock_mode();

        dp.configure().await.unwrap();

        let cmds = dp.captured_commands();
        assert!(cmds.iter().any(|c| c.contains("set \"eth2\" up")));
        assert!(cmds.iter().any(|c| c.contains("set \"eth3\" up")));
        assert!(cmds.iter().any(|c| c.contains("/sbin/ifup \"bond0\"")));
        assert!(cmds.iter().any(|c| c.contains("addif \"xapi2\" \"bond0\"")));
    }

    #[tokio::test]
    async fn test_bring_down_vlan_pif() {
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-vlan-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, "/tmp/unused").with_mock_mode();

        dp.bring_down().await.unwrap();

        let cmds = dp.captured_commands();
        assert!(cmds.iter().any(|c| c.contains("delif \"xapi1\" \"eth0.100\"")));
        assert!(cmds.iter().any(|c| c.contains("delbr \"xapi1\"")));
        assert!(cmds.iter().any(|c| c.contains("vconfig rem \"eth0.100\"")));
    }

    #[tokio::test]
    async fn test_bring_down_existing_is_best_effort() {
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, "/tmp/unused").with_mock_mode();

        dp.bring_down_existing().await.unwrap();

        let cmds = dp.captured_commands();
        assert!(cmds.iter().any(|c| c.contains("set \"xenbr0\" down")));
        assert!(cmds.iter().any(|c| c.contains("delbr \"xenbr0\"")));
    }

    #[test]
    fn test_configure_ipdev_writes_bridge_marker() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();
        let dp = BridgeDatapath::new(&cache, pif, dir.path());

        let target = dir.path().join("ifcfg-xenbr0");
        let mut txn = ConfigTransaction::new(&target).unwrap();
        dp.configure_ipdev(&mut txn).unwrap();
        txn.close().unwrap();
        txn.apply().unwrap();

        let content = std::fs::read_to_string(&target).unwrap();
        assert!(content.contains("TYPE=Bridge"));
        assert!(content.contains("DELAY=0"));
    }

    #[test]
    fn test_preconfigure_stages_device_file_as_child() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, dir.path());

        let mut parent =
            ConfigTransaction::new(dir.path().join("ifcfg-xenbr0")).unwrap();
        parent.write_line("DEVICE=xenbr0").unwrap();
        dp.preconfigure(&mut parent).unwrap();
        parent.close().unwrap();
        parent.apply().unwrap();

        let device_cfg =
            std::fs::read_to_string(dir.path().join("ifcfg-eth0")).unwrap();
        assert!(device_cfg.contains("DEVICE=eth0"));
        assert!(device_cfg.contains("MTU=1500"));
        assert_eq!(parent.state(), TxnState::Applied);
    }

    #[test]
    fn test_preconfigure_bond_stages_master_and_slaves() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-bond0-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, dir.path());

        let mut parent =
            ConfigTransaction::new(dir.path().join("ifcfg-xapi2")).unwrap();
        dp.preconfigure(&mut parent).unwrap();
        parent.close().unwrap();
        parent.apply().unwrap();

        let master = std::fs::read_to_string(dir.path().join("ifcfg-bond0")).unwrap();
        assert!(master.contains("BONDING_OPTS="));
        let slave = std::fs::read_to_string(dir.path().join("ifcfg-eth2")).unwrap();
        assert!(slave.contains("MASTER=bond0"));
        assert!(slave.contains("SLAVE=yes"));
    }

    #[test]
    fn test_preconfigure_stages_static_routes() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-static-uuid").unwrap();
        let mut dp = BridgeDatapath::new(&cache, pif, dir.path());

        let mut parent =
            ConfigTransaction::new(dir.path().join("ifcfg-xenbr1")).unwrap();
        dp.preconfigure(&mut parent).unwrap();
        parent.close().unwrap();
        parent.apply().unwrap();

        let routes = std::fs::read_to_string(dir.path().join("route-xenbr1")).unwrap();
        assert!(routes.contains("172.16.0.0/16 via 10.0.0.254"));
    }
}
