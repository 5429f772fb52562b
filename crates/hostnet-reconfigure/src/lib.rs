//! Host network interface reconfiguration tool.
//!
//! Materializes desired network configuration (physical NICs, VLANs,
//! bonds, bridges) from a management-plane snapshot into host-level
//! network configuration, with transactional apply/revert/commit
//! semantics and pluggable datapath backends:
//!
//! - [`datapath`]: the [`Datapath`] contract and backend factory
//! - [`bridge`]: Linux-bridge backend
//! - [`vswitch`]: Open vSwitch backend
//! - [`commands`]: shell command builders for both backends
//! - [`ifcfg`]: interface configuration file content
//! - [`reconfigure`]: the up/down/rewrite drivers
//!
//! # Operation ordering
//!
//! The datapath contract is enforced by caller discipline, not by the
//! interface: `preconfigure` → transaction apply → `bring_down_existing`
//! → `configure` → bring up the IP device → `post`, and independently
//! `bring_down` → transaction revert/commit. The IP-bearing device is
//! never brought up before the datapath devices supporting it exist.

pub mod bridge;
pub mod commands;
pub mod datapath;
pub mod error;
pub mod ifcfg;
pub mod reconfigure;
pub mod vswitch;

#[cfg(test)]
pub(crate) mod testutil;

pub use datapath::{new_datapath, read_network_backend, Datapath, NetworkBackend};
pub use error::{ReconfigureError, ReconfigureResult};
