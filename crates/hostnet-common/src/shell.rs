//! External command execution for the reconfiguration engine.
//!
//! All host-level device manipulation goes through external tools; this
//! module runs them, captures their output, and logs every invocation.
//! Command failure is surfaced as an [`ExecResult`] carrying the exit
//! code: callers decide whether a non-zero exit is fatal to the overall
//! reconfiguration. [`exec_or_throw`] converts failure into an error for
//! commands that must succeed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{HostNetError, HostNetResult};

/// Path to the `ip` command.
pub const IP_CMD: &str = "/sbin/ip";

/// Path to the `brctl` command for Linux bridge control.
pub const BRCTL_CMD: &str = "/usr/sbin/brctl";

/// Path to the `vconfig` command for VLAN device management.
pub const VCONFIG_CMD: &str = "/sbin/vconfig";

/// Path to the `ifup` command.
pub const IFUP_CMD: &str = "/sbin/ifup";

/// Path to the `ifdown` command.
pub const IFDOWN_CMD: &str = "/sbin/ifdown";

/// Path to the `ethtool` command.
pub const ETHTOOL_CMD: &str = "/sbin/ethtool";

/// Path to the `ovs-vsctl` command for Open vSwitch configuration.
pub const OVS_VSCTL_CMD: &str = "/usr/bin/ovs-vsctl";

/// Characters that need escaping inside shell double-quotes:
/// $, `, ", \, and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe interpolation into a shell command line.
///
/// Wraps the string in double quotes and escapes every character with
/// special meaning inside them, so device names coming from the
/// management plane cannot inject commands.
///
/// # Example
///
/// ```
/// use hostnet_common::shell::shellquote;
///
/// assert_eq!(shellquote("eth0"), "\"eth0\"");
/// assert_eq!(shellquote("eth0; rm -rf /"), "\"eth0; rm -rf /\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of an external command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a command line through `/bin/sh -c`.
///
/// Returns the execution result regardless of exit code; an `Err` is
/// produced only when the command could not be spawned at all.
pub async fn exec(cmd: &str) -> HostNetResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| HostNetError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a command line and errors on non-zero exit.
///
/// Use for commands whose failure is fatal to the reconfiguration.
pub async fn exec_or_throw(cmd: &str) -> HostNetResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(HostNetError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
