//! Common infrastructure for host network reconfiguration tools.
//!
//! This crate provides the shared plumbing used by the reconfiguration
//! engine:
//!
//! - [`shell`]: external command execution with safe quoting
//! - [`transaction`]: staged configuration file transactions with
//!   apply/revert/commit semantics
//! - [`error`]: error types shared across the workspace
//!
//! # Architecture
//!
//! The reconfiguration engine runs as a one-shot process per invocation.
//! Configuration files are never edited in place: a new version is staged
//! beside the target, swapped in via hard links on apply, and either
//! committed (backup discarded) or reverted (backup restored). External
//! tools (`ip`, `brctl`, `ovs-vsctl`, ...) are invoked through [`shell`]
//! and their exit codes surfaced to the caller.

pub mod error;
pub mod shell;
pub mod transaction;

// Re-export commonly used items at crate root
pub use error::{HostNetError, HostNetResult};
pub use transaction::{ConfigTransaction, TxnState};
