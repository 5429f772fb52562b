//! The datapath contract and backend factory.
//!
//! A [`Datapath`] encapsulates how a given PIF's network datapath is
//! brought up or down, independent of whether the underlying mechanism
//! is a Linux bridge or an Open vSwitch instance. The concrete backend
//! is selected once at startup from the host's backend selector file.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hostnet_common::ConfigTransaction;
use hostnet_model::{NetworkCache, PifRef};

use crate::bridge::BridgeDatapath;
use crate::error::{ReconfigureError, ReconfigureResult};
use crate::vswitch::VswitchDatapath;

/// Default path of the backend selector file; its first line names the
/// configured network backend.
pub const NETWORK_BACKEND_PATH: &str = "/etc/xensource/network.conf";

/// The two supported datapath backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkBackend {
    /// Linux bridging.
    Bridge,
    /// Open vSwitch.
    Vswitch,
}

impl NetworkBackend {
    /// Returns the canonical backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkBackend::Bridge => "bridge",
            NetworkBackend::Vswitch => "openvswitch",
        }
    }
}

impl FromStr for NetworkBackend {
    type Err = ReconfigureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(NetworkBackend::Bridge),
            "openvswitch" | "vswitch" => Ok(NetworkBackend::Vswitch),
            other => Err(ReconfigureError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Reads the configured backend from the first line of the selector
/// file.
pub fn read_network_backend(path: impl AsRef<Path>) -> ReconfigureResult<NetworkBackend> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ReconfigureError::BackendUnavailable {
        path: path.to_path_buf(),
        source: e,
    })?;
    content.lines().next().unwrap_or("").trim().parse()
}

/// How a PIF's datapath is (de)configured on this host.
///
/// The operations compose into a caller-enforced state machine:
/// `preconfigure` → transaction apply → `bring_down_existing` →
/// `configure` → bring up the IP device → `post`, and independently
/// `bring_down` → transaction revert/commit. No operation may be
/// skipped or reordered: the IP device must never come up before the
/// datapath devices supporting it exist.
#[async_trait]
pub trait Datapath {
    /// Writes the fields declaring the IP-bearing device's type (and
    /// any backend-specific fields) into the given transaction. Brings
    /// nothing up.
    fn configure_ipdev(&self, txn: &mut ConfigTransaction) -> ReconfigureResult<()>;

    /// Stages (but does not apply) the configuration changes this
    /// PIF's datapath needs, attaching created transactions as children
    /// of `parent` so they share its lifecycle.
    fn preconfigure(&mut self, parent: &mut ConfigTransaction) -> ReconfigureResult<()>;

    /// Synchronously tears down pre-existing device configuration that
    /// would conflict with bringing this datapath up.
    async fn bring_down_existing(&mut self) -> ReconfigureResult<()>;

    /// Brings up every backend device needed for the datapath, assuming
    /// the owning transaction has been applied. Explicitly excludes the
    /// IP-bearing device itself; that is a separate, later step owned
    /// by the caller.
    async fn configure(&mut self) -> ReconfigureResult<()>;

    /// Runs after the IP-bearing device is up; reinstates anything torn
    /// down in [`bring_down_existing`](Self::bring_down_existing).
    async fn post(&mut self) -> ReconfigureResult<()>;

    /// Tears down and fully deconfigures the datapath, assuming the
    /// IP-bearing device is already down.
    async fn bring_down(&mut self) -> ReconfigureResult<()>;
}

/// Constructs the backend selected for this host.
pub fn new_datapath<'a>(
    backend: NetworkBackend,
    cache: &'a NetworkCache,
    pif: PifRef,
    scripts_dir: impl Into<PathBuf>,
) -> Box<dyn Datapath + 'a> {
    match backend {
        NetworkBackend::Bridge => Box::new(BridgeDatapath::new(cache, pif, scripts_dir)),
        NetworkBackend::Vswitch => Box::new(VswitchDatapath::new(cache, pif, scripts_dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(
            "bridge".parse::<NetworkBackend>().unwrap(),
            NetworkBackend::Bridge
        );
        assert_eq!(
            "openvswitch".parse::<NetworkBackend>().unwrap(),
            NetworkBackend::Vswitch
        );
        assert_eq!(
            "vswitch".parse::<NetworkBackend>().unwrap(),
            NetworkBackend::Vswitch
        );
    }

    #[test]
    fn test_backend_from_str_unknown_is_an_error() {
        match "linuxbridge".parse::<NetworkBackend>() {
            Err(ReconfigureError::UnknownBackend { name }) => {
                assert_eq!(name, "linuxbridge");
            }
            other => panic!("Expected UnknownBackend, got {:?}", other),
        }
    }

    #[test]
    fn test_read_network_backend_first_line_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("network.conf");
        std::fs::write(&path, "openvswitch\n# trailing comment\n").unwrap();
        assert_eq!(
            read_network_backend(&path).unwrap(),
            NetworkBackend::Vswitch
        );
    }

    #[test]
    fn test_read_network_backend_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.conf");
        assert!(matches!(
            read_network_backend(&path),
            Err(ReconfigureError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_backend_as_str() {
        assert_eq!(NetworkBackend::Bridge.as_str(), "bridge");
        assert_eq!(NetworkBackend::Vswitch.as_str(), "openvswitch");
    }
}
