//! Error types shared across the reconfiguration workspace.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::transaction::TxnState;

/// Result type alias for common operations.
pub type HostNetResult<T> = Result<T, HostNetError>;

/// Errors raised by the shared infrastructure.
#[derive(Debug, Error)]
pub enum HostNetError {
    /// Failed to spawn an external command.
    #[error("Failed to execute command '{command}': {source}")]
    ShellExec {
        /// The command that failed to spawn.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// External command returned a non-zero exit code.
    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// A transaction operation was called in the wrong lifecycle state.
    ///
    /// This is a programming error in the caller, never a transient
    /// condition; it is kept distinct from IO errors so that protocol
    /// violations are diagnosable at a glance.
    #[error("Attempt to {op} file in state {state}")]
    InvalidTransition {
        /// The operation that was attempted.
        op: &'static str,
        /// The state the transaction was actually in.
        state: TxnState,
    },

    /// Filesystem operation failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path the operation touched.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl HostNetError {
    /// Creates an IO error tagged with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = HostNetError::InvalidTransition {
            op: "write",
            state: TxnState::Applied,
        };
        assert_eq!(err.to_string(), "Attempt to write file in state APPLIED");
    }

    #[test]
    fn test_shell_command_failed_display() {
        let err = HostNetError::ShellCommandFailed {
            command: "/sbin/ip link set dev eth0 up".to_string(),
            exit_code: 2,
            output: "Cannot find device \"eth0\"".to_string(),
        };
        assert!(err.to_string().contains("ip link set dev eth0 up"));
        assert!(err.to_string().contains("exit code 2"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = HostNetError::io(
            "/etc/sysconfig/network-scripts/ifcfg-eth0",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.to_string().contains("ifcfg-eth0"));
    }
}
