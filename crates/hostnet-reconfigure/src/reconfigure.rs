//! The up/down/rewrite reconfiguration drivers.
//!
//! These enforce the datapath operation ordering: staged configuration
//! is applied before any device is touched, the IP-bearing device only
//! comes up after `configure`, and a failed bring-up reverts the whole
//! transaction tree.

use std::path::Path;
use tracing::{error, info, warn};

use hostnet_common::{shell, ConfigTransaction};
use hostnet_model::{NetworkCache, PifRef};

use crate::commands::{build_ifdown_cmd, build_ifup_cmd};
use crate::datapath::{new_datapath, Datapath, NetworkBackend};
use crate::error::ReconfigureResult;
use crate::ifcfg;

/// Default path of the network cache snapshot file.
pub const CACHE_FILE_PATH: &str = "/var/xapi/network.dbcache";

/// Stages the full configuration for a PIF's IP device and datapath
/// into one transaction tree, closed and ready to apply.
fn stage_configuration(
    cache: &NetworkCache,
    datapath: &mut (dyn Datapath + '_),
    pif: &PifRef,
    ipdev: &str,
    scripts_dir: &Path,
) -> ReconfigureResult<ConfigTransaction> {
    let mut txn = ConfigTransaction::new(ifcfg::ifcfg_path(scripts_dir, ipdev))?;
    for line in ifcfg::header_lines(ipdev) {
        txn.write_line(&line)?;
    }
    datapath.configure_ipdev(&mut txn)?;
    for line in ifcfg::ipdev_lines(cache, pif)? {
        txn.write_line(&line)?;
    }
    datapath.preconfigure(&mut txn)?;
    txn.close()?;
    Ok(txn)
}

async fn bring_up(datapath: &mut (dyn Datapath + '_), ipdev: &str) -> ReconfigureResult<()> {
    datapath.bring_down_existing().await?;
    datapath.configure().await?;
    // Only now may the IP-bearing device come up: its supporting
    // datapath devices exist.
    shell::exec_or_throw(&build_ifup_cmd(ipdev)).await?;
    datapath.post().await?;
    Ok(())
}

/// Brings a PIF's datapath and IP configuration up.
///
/// On any bring-up failure the applied transaction tree is reverted so
/// the host keeps its previous configuration files.
pub async fn action_up(
    cache: &NetworkCache,
    backend: NetworkBackend,
    pif: &PifRef,
    scripts_dir: &Path,
) -> ReconfigureResult<()> {
    let ipdev = cache.pif_ipdev_name(pif)?;
    info!(pif = %pif, ipdev = %ipdev, "Bringing interface up");

    let mut datapath = new_datapath(backend, cache, pif.clone(), scripts_dir);
    let mut txn = stage_configuration(cache, datapath.as_mut(), pif, &ipdev, scripts_dir)?;
    txn.apply()?;

    match bring_up(datapath.as_mut(), &ipdev).await {
        Ok(()) => {
            txn.commit()?;
            info!(ipdev = %ipdev, "Interface up");
            Ok(())
        }
        Err(e) => {
            error!(ipdev = %ipdev, error = %e, "Bring-up failed, reverting configuration");
            if let Err(revert_err) = txn.revert() {
                error!(error = %revert_err, "Revert failed; staged files left on disk");
            }
            Err(e)
        }
    }
}

/// Brings a PIF's datapath down.
///
/// The IP device is taken down first; an `ifdown` failure is logged
/// and teardown continues, since the datapath must be deconfigured
/// regardless.
pub async fn action_down(
    cache: &NetworkCache,
    backend: NetworkBackend,
    pif: &PifRef,
    scripts_dir: &Path,
) -> ReconfigureResult<()> {
    let ipdev = cache.pif_ipdev_name(pif)?;
    info!(pif = %pif, ipdev = %ipdev, "Bringing interface down");

    let result = shell::exec(&build_ifdown_cmd(&ipdev)).await?;
    if !result.success() {
        warn!(ipdev = %ipdev, exit_code = result.exit_code, "ifdown failed, continuing teardown");
    }

    let mut datapath = new_datapath(backend, cache, pif.clone(), scripts_dir);
    datapath.bring_down().await?;

    info!(ipdev = %ipdev, "Interface down");
    Ok(())
}

/// Rewrites the configuration files for a PIF without touching device
/// state.
pub fn action_rewrite(
    cache: &NetworkCache,
    backend: NetworkBackend,
    pif: &PifRef,
    scripts_dir: &Path,
) -> ReconfigureResult<()> {
    let ipdev = cache.pif_ipdev_name(pif)?;
    info!(pif = %pif, ipdev = %ipdev, "Rewriting configuration");

    let mut datapath = new_datapath(backend, cache, pif.clone(), scripts_dir);
    let mut txn = stage_configuration(cache, datapath.as_mut(), pif, &ipdev, scripts_dir)?;
    txn.apply()?;
    txn.commit()?;

    info!(ipdev = %ipdev, "Configuration rewritten");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture_cache;
    use tempfile::TempDir;

    #[test]
    fn test_rewrite_bridge_backend_writes_ipdev_and_children() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();

        action_rewrite(&cache, NetworkBackend::Bridge, &pif, dir.path()).unwrap();

        let ipdev_cfg = std::fs::read_to_string(dir.path().join("ifcfg-xenbr0")).unwrap();
        assert!(ipdev_cfg.contains("DEVICE=xenbr0"));
        assert!(ipdev_cfg.contains("TYPE=Bridge"));
        assert!(ipdev_cfg.contains("BOOTPROTO=dhcp"));
        assert!(ipdev_cfg.contains("MTU=1500"));

        let device_cfg = std::fs::read_to_string(dir.path().join("ifcfg-eth0")).unwrap();
        assert!(device_cfg.contains("DEVICE=eth0"));

        // Committed: no staging or backup files remain.
        assert!(!dir.path().join(".ifcfg-xenbr0.xapi-new").exists());
        assert!(!dir.path().join(".ifcfg-xenbr0.xapi-old").exists());
        assert!(!dir.path().join(".ifcfg-eth0.xapi-new").exists());
    }

    #[test]
    fn test_rewrite_vswitch_backend_writes_ovs_marker() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();

        action_rewrite(&cache, NetworkBackend::Vswitch, &pif, dir.path()).unwrap();

        let ipdev_cfg = std::fs::read_to_string(dir.path().join("ifcfg-xenbr0")).unwrap();
        assert!(ipdev_cfg.contains("TYPE=OVSBridge"));
        assert!(ipdev_cfg.contains("DEVICETYPE=ovs"));
        // The OVS backend stages no per-device files.
        assert!(!dir.path().join("ifcfg-eth0").exists());
    }

    #[test]
    fn test_rewrite_static_pif_carries_addressing_and_routes() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-static-uuid").unwrap();

        action_rewrite(&cache, NetworkBackend::Bridge, &pif, dir.path()).unwrap();

        let ipdev_cfg = std::fs::read_to_string(dir.path().join("ifcfg-xenbr1")).unwrap();
        assert!(ipdev_cfg.contains("IPADDR=10.0.0.2"));
        assert!(ipdev_cfg.contains("GATEWAY=10.0.0.1"));

        let routes = std::fs::read_to_string(dir.path().join("route-xenbr1")).unwrap();
        assert!(routes.contains("172.16.0.0/16 via 10.0.0.254"));
    }

    #[test]
    fn test_rewrite_replaces_existing_file_and_discards_backup() {
        let dir = TempDir::new().unwrap();
        let cache = fixture_cache();
        let pif = cache.get_pif_by_uuid("pif-eth0-uuid").unwrap();

        std::fs::write(dir.path().join("ifcfg-xenbr0"), "STALE=yes\n").unwrap();
        action_rewrite(&cache, NetworkBackend::Bridge, &pif, dir.path()).unwrap();

        let ipdev_cfg = std::fs::read_to_string(dir.path().join("ifcfg-xenbr0")).unwrap();
        assert!(!ipdev_cfg.contains("STALE"));
        assert!(!dir.path().join(".ifcfg-xenbr0.xapi-old").exists());
    }
}
