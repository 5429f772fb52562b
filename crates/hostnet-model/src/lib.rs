//! Network object model and cache for host network reconfiguration.
//!
//! This crate is the single source of truth for "what does the management
//! plane say this host's network topology looks like". It provides:
//!
//! - [`types`]: PIF/VLAN/Bond/Network records and opaque references
//! - [`cache`]: the per-host [`NetworkCache`] snapshot and its topology
//!   queries
//! - [`xml`]: the durable XML snapshot codec (strict encode, lenient
//!   decode)
//! - [`inventory`]: the host inventory file parser
//! - [`api`]: the management-plane API boundary (trait + scoped session)
//! - [`settings`]: effective MTU and ethtool settings resolution
//!
//! # Construction
//!
//! The cache is built exactly once per process run, either live from a
//! [`api::ManagementApi`] implementation (filtering every record down to
//! the current host) or from a previously serialized XML snapshot. The
//! snapshot exists precisely so that reconfiguration can proceed at boot
//! before management-plane connectivity exists; attachment state is never
//! trusted from it.

pub mod api;
pub mod cache;
pub mod error;
pub mod inventory;
pub mod settings;
pub mod types;
pub mod xml;

// Re-export commonly used items at crate root
pub use cache::NetworkCache;
pub use error::{ModelError, ModelResult};
pub use types::{
    BondRecord, BondRef, HostRef, IpConfigMode, NetworkRecord, NetworkRef, PifRecord, PifRef,
    SessionRef, SettingsMap, VlanRecord, VlanRef,
};
