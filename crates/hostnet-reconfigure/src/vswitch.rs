//! Open vSwitch datapath backend.
//!
//! The datapath lives in the OVS database rather than in staged device
//! files: bridges are created with `ovs-vsctl`, VLAN PIFs become fake
//! bridges on their parent, bonds become bonded ports. Only static
//! routes still go through staged files.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use hostnet_common::{shell, ConfigTransaction};
use hostnet_model::settings;
use hostnet_model::{NetworkCache, PifRef};

use crate::commands::{
    build_del_bridge_cmd, build_ethtool_offload_cmd, build_ethtool_opts_cmd, build_link_down_cmd,
    build_link_up_cmd, build_ovs_add_bond_cmd, build_ovs_add_bridge_cmd,
    build_ovs_add_fake_bridge_cmd, build_ovs_del_bridge_cmd, build_ovs_del_port_cmd,
    build_ovs_add_port_cmd, build_set_mtu_cmd,
};
use crate::datapath::Datapath;
use crate::error::ReconfigureResult;
use crate::ifcfg;

/// Open vSwitch backend for one PIF.
pub struct VswitchDatapath<'a> {
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

impl<'a> VswitchDatapath<'a> {
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

    async fn exec(&mut self, cmd: &str) -> ReconfigureResult<()> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            return Ok(());
        }

        shell::exec_or_throw(cmd).await?;
        Ok(())
    }

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

    /// The bridge of the physical PIF a VLAN PIF sits on.
    fn parent_bridge_name(&self) -> ReconfigureResult<String> {
        let physical = self.cache.pif_get_vlan_physical(&self.pif)?;
        Ok(self.cache.pif_ipdev_name(&physical)?)
    }

    fn effective_mtu(&self) -> ReconfigureResult<String> {
        let record = self.cache.pif(&self.pif)?;
        let network = self.cache.network(&record.network)?;
        let ipdev = self.cache.pif_ipdev_name(&self.pif)?;
        Ok(settings::mtu_setting(network, &ipdev, &record.other_config))
    }

    fn slave_devices(&self) -> ReconfigureResult<Vec<String>> {
        let mut devices = Vec::new();
        for slave in self.cache.pif_get_bond_slaves(&self.pif)? {
            devices.push(self.cache.pif(&slave)?.device.clone());
        }
        Ok(devices)
    }
}

#[async_trait]
impl Datapath for VswitchDatapath<'_> {
    fn configure_ipdev(&self, txn: &mut ConfigTransaction) -> ReconfigureResult<()> {
        txn.write_line("TYPE=OVSBridge")?;
        txn.write_line("DEVICETYPE=ovs")?;
        Ok(())
    }

    fn preconfigure(&mut self, parent: &mut ConfigTransaction) -> ReconfigureResult<()> {
        // The datapath itself lives in the OVS database; only static
        // routes need a staged file.
        let record = self.cache.pif(&self.pif)?;
        let network = self.cache.network(&record.network)?;
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

        debug!(pif = %self.pif, "Staged vswitch datapath configuration");
        Ok(())
    }

    async fn bring_down_existing(&mut self) -> ReconfigureResult<()> {
        // A legacy Linux bridge of the same name would shadow the OVS
        // bridge; remove it if present.
        let bridge = self.bridge_name()?;
        self.exec_best_effort(&build_link_down_cmd(&bridge)).await;
        self.exec_best_effort(&build_del_bridge_cmd(&bridge)).await;
        Ok(())
    }

    async fn configure(&mut self) -> ReconfigureResult<()> {
        let bridge = self.bridge_name()?;
        let record = self.cache.pif(&self.pif)?.clone();
        let mtu = self.effective_mtu()?;
        let is_vlan = self.cache.pif_is_vlan(&self.pif)?;
        let is_bond = self.cache.pif_is_bond(&self.pif)?;

        if is_vlan {
            let parent = self.parent_bridge_name()?;
            self.exec(&build_ovs_add_fake_bridge_cmd(&bridge, &parent, &record.vlan))
                .await?;
            info!(bridge = %bridge, parent = %parent, tag = %record.vlan,
                "Configured vswitch fake bridge");
            return Ok(());
        }

        self.exec(&build_ovs_add_bridge_cmd(&bridge)).await?;

        let (opts, offloads) = settings::ethtool_settings(&record.other_config);
        let devices = if is_bond {
            self.slave_devices()?
        } else {
            vec![record.device.clone()]
        };
        for device in &devices {
            if !opts.is_empty() {
                self.exec_best_effort(&build_ethtool_opts_cmd(device, &opts))
                    .await;
            }
            if !offloads.is_empty() {
                self.exec_best_effort(&build_ethtool_offload_cmd(device, &offloads))
                    .await;
            }
        }

        if is_bond {
            self.exec(&build_ovs_add_bond_cmd(&bridge, &record.device, &devices))
                .await?;
        } else {
            self.exec(&build_ovs_add_port_cmd(&bridge, &record.device))
                .await?;
        }

        for device in &devices {
            self.exec(&build_link_up_cmd(device)).await?;
            self.exec(&build_set_mtu_cmd(device, &mtu)).await?;
        }

        info!(bridge = %bridge, "Configured vswitch datapath");
        Ok(())
    }

    async fn post(&mut self) -> ReconfigureResult<()> {
        debug!(pif = %self.pif, "Vswitch datapath post-configuration complete");
        Ok(())
    }

    async fn bring_down(&mut self) -> ReconfigureResult<()> {
        let bridge = self.bridge_name()?;
        let record = self.cache.pif(&self.pif)?.clone();
        let is_vlan = self.cache.pif_is_vlan(&self.pif)?;
        let is_bond = self.cache.pif_is_bond(&self.pif)?;

        if is_vlan {
            // A fake bridge owns no ports of its own.
            self.exec(&build_ovs_del_bridge_cmd(&bridge)).await?;
            info!(bridge = %bridge, "Brought down vswitch fake bridge");
            return Ok(());
        }

        let devices = if is_bond {
            self.slave_devices()?
        } else {
            vec![record.device.clone()]
        };
        self.exec_best_effort(&build_ovs_del_port_cmd(&bridge, &record.device))
            .await;
        self.exec(&build_ovs_del_bridge_cmd(&bridge)).await?;
        for device in &devices {
            self.exec(&build_link_down_cmd(device)).await?;
        }

        info!(bridge = %bridge, "Brought down vswitch datapath");
        Ok(())
    }
}
