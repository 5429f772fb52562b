//! Staged configuration file transactions.
//!
//! A [`ConfigTransaction`] stages a replacement for a single file on disk
//! without disturbing the active copy until [`apply`](ConfigTransaction::apply)
//! is called. The staged content lives beside the target as
//! `.{name}.xapi-new`; on apply the current content is preserved as
//! `.{name}.xapi-old` via a hard link before the staged file is linked
//! onto the target. These dotted names are part of the on-disk contract
//! and may be inspected by other tooling.
//!
//! Hard links (rather than copy or rename) keep the backup and the new
//! content on the same filesystem relative to the directory entry swap,
//! and a concurrent reader never observes a partially written file. The
//! window between unlink and re-link in which the target is briefly
//! absent is an accepted risk of the design.
//!
//! A transaction owns zero or more child transactions; apply, revert and
//! commit each recurse into the children before performing the owning
//! transaction's own file operation, so a multi-file change (an
//! interface's config file plus the files it depends on) shares one
//! lifecycle.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{HostNetError, HostNetResult};

/// Suffix of the staging file created beside the target.
pub const STAGING_SUFFIX: &str = ".xapi-new";

/// Suffix of the backup file created on apply.
pub const BACKUP_SUFFIX: &str = ".xapi-old";

/// Lifecycle states of a [`ConfigTransaction`].
///
/// Transitions are one-directional:
/// `OPEN -> NOT_APPLIED -> APPLIED -> (COMMITTED | REVERTED)`.
/// `REVERTED` is a dead end; retrying requires a fresh transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Staging file is open for writing.
    Open,
    /// Staging file is finalized but not yet swapped in.
    NotApplied,
    /// Staged content is live; the prior content is held as backup.
    Applied,
    /// Change finalized; backup discarded, revert no longer possible.
    Committed,
    /// Change rolled back; the staged content is left on disk for
    /// debugging.
    Reverted,
}

impl TxnState {
    /// Returns the state name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::Open => "OPEN",
            TxnState::NotApplied => "NOT_APPLIED",
            TxnState::Applied => "APPLIED",
            TxnState::Committed => "COMMITTED",
            TxnState::Reverted => "REVERTED",
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the hidden sibling path `dir/.{name}{suffix}` for a target.
fn sibling_path(path: &Path, suffix: &str) -> HostNetResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            HostNetError::internal(format!("config path has no file name: {}", path.display()))
        })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!(".{}{}", name, suffix)))
}

/// A staged change to one configuration file, with optional dependent
/// child transactions sharing its lifecycle.
pub struct ConfigTransaction {
    path: PathBuf,
    state: TxnState,
    staging: Option<File>,
    children: Vec<ConfigTransaction>,
}

impl ConfigTransaction {
    /// Opens a new staging file beside `path` and returns a transaction
    /// in the `OPEN` state.
    pub fn new(path: impl Into<PathBuf>) -> HostNetResult<Self> {
        let path = path.into();
        let staging = sibling_path(&path, STAGING_SUFFIX)?;
        let file = File::create(&staging).map_err(|e| HostNetError::io(&staging, e))?;
        debug!(
            target_path = %path.display(),
            staging_path = %staging.display(),
            "Opened staged config file"
        );
        Ok(Self {
            path,
            state: TxnState::Open,
            staging: Some(file),
            children: Vec::new(),
        })
    }

    /// The target path this transaction replaces.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current lifecycle state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    fn expect_state(&self, expected: TxnState, op: &'static str) -> HostNetResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HostNetError::InvalidTransition {
                op,
                state: self.state,
            })
        }
    }

    /// Appends raw bytes to the staging file. Valid only in `OPEN`.
    pub fn write(&mut self, data: &[u8]) -> HostNetResult<()> {
        self.expect_state(TxnState::Open, "write")?;
        let file = self
            .staging
            .as_mut()
            .ok_or_else(|| HostNetError::internal("staging file handle missing"))?;
        let staging = sibling_path(&self.path, STAGING_SUFFIX)?;
        file.write_all(data).map_err(|e| HostNetError::io(staging, e))
    }

    /// Appends one line (newline added) to the staging file.
    pub fn write_line(&mut self, line: &str) -> HostNetResult<()> {
        self.write(line.as_bytes())?;
        self.write(b"\n")
    }

    /// Finalizes the staging file and transitions `OPEN -> NOT_APPLIED`.
    pub fn close(&mut self) -> HostNetResult<()> {
        self.expect_state(TxnState::Open, "close")?;
        if let Some(mut file) = self.staging.take() {
            let staging = sibling_path(&self.path, STAGING_SUFFIX)?;
            file.flush().map_err(|e| HostNetError::io(staging, e))?;
        }
        self.state = TxnState::NotApplied;
        Ok(())
    }

    /// Adds a dependent child transaction.
    ///
    /// Children share this transaction's apply/revert/commit lifecycle
    /// and are recursed into first on every lifecycle operation.
    pub fn attach_child(&mut self, child: ConfigTransaction) {
        self.children.push(child);
    }

    /// Swaps the staged content onto the target path.
    ///
    /// Valid only in `NOT_APPLIED`. Children are applied first so that
    /// dependents are in place before the owning file takes effect (a
    /// bridge config must not go live before the interface configs it
    /// references). The prior target content, if any, is preserved at
    /// the backup path via a hard link.
    pub fn apply(&mut self) -> HostNetResult<()> {
        self.expect_state(TxnState::NotApplied, "apply")?;
        for child in &mut self.children {
            child.apply()?;
        }

        let staging = sibling_path(&self.path, STAGING_SUFFIX)?;
        let backup = sibling_path(&self.path, BACKUP_SUFFIX)?;

        if backup.exists() {
            fs::remove_file(&backup).map_err(|e| HostNetError::io(&backup, e))?;
        }
        if self.path.exists() {
            fs::hard_link(&self.path, &backup).map_err(|e| HostNetError::io(&backup, e))?;
            fs::remove_file(&self.path).map_err(|e| HostNetError::io(&self.path, e))?;
        }
        fs::hard_link(&staging, &self.path).map_err(|e| HostNetError::io(&self.path, e))?;
        fs::remove_file(&staging).map_err(|e| HostNetError::io(&staging, e))?;

        self.state = TxnState::Applied;
        info!(target_path = %self.path.display(), "Applied staged config file");
        Ok(())
    }

    /// Restores the pre-apply content of the target path.
    ///
    /// Valid only in `APPLIED`. Children are reverted first, in the same
    /// order apply used; callers must arrange that this ordering is the
    /// functional inverse of apply (bring a bridge down before reverting
    /// the interface config it depended on). The applied content is
    /// linked back to the staging path and left on disk for debugging.
    pub fn revert(&mut self) -> HostNetResult<()> {
        self.expect_state(TxnState::Applied, "revert")?;
        for child in &mut self.children {
            child.revert()?;
        }

        let staging = sibling_path(&self.path, STAGING_SUFFIX)?;
        let backup = sibling_path(&self.path, BACKUP_SUFFIX)?;

        if staging.exists() {
            fs::remove_file(&staging).map_err(|e| HostNetError::io(&staging, e))?;
        }
        if self.path.exists() {
            fs::hard_link(&self.path, &staging).map_err(|e| HostNetError::io(&staging, e))?;
            fs::remove_file(&self.path).map_err(|e| HostNetError::io(&self.path, e))?;
        }
        if backup.exists() {
            fs::hard_link(&backup, &self.path).map_err(|e| HostNetError::io(&self.path, e))?;
            fs::remove_file(&backup).map_err(|e| HostNetError::io(&backup, e))?;
        }

        self.state = TxnState::Reverted;
        info!(target_path = %self.path.display(), "Reverted staged config file");
        Ok(())
    }

    /// Finalizes the applied change, forfeiting the ability to revert.
    ///
    /// Valid only in `APPLIED`. Children are committed first. The backup
    /// and any leftover staging file are removed.
    pub fn commit(&mut self) -> HostNetResult<()> {
        self.expect_state(TxnState::Applied, "commit")?;
        for child in &mut self.children {
            child.commit()?;
        }

        let staging = sibling_path(&self.path, STAGING_SUFFIX)?;
        let backup = sibling_path(&self.path, BACKUP_SUFFIX)?;

        if backup.exists() {
            fs::remove_file(&backup).map_err(|e| HostNetError::io(&backup, e))?;
        }
        if staging.exists() {
            fs::remove_file(&staging).map_err(|e| HostNetError::io(&staging, e))?;
        }

        self.state = TxnState::Committed;
        debug!(target_path = %self.path.display(), "Committed staged config file");
        Ok(())
    }

    /// Best-effort read of the current (pre-staging) target content.
    ///
    /// Returns an empty vector when the target is absent or unreadable;
    /// callers inspecting "what's there now" do not care whether
    /// anything is there yet.
    pub fn read_lines(&self) -> Vec<String> {
        match File::open(&self.path) {
            Ok(file) => BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
