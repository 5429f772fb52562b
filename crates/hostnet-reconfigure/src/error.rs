//! Error types for the reconfiguration tool.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use hostnet_common::HostNetError;
use hostnet_model::ModelError;

/// Result type alias for reconfiguration operations.
pub type ReconfigureResult<T> = Result<T, ReconfigureError>;

/// Errors raised by backend selection and the reconfiguration drivers.
#[derive(Debug, Error)]
pub enum ReconfigureError {
    /// The backend selector file could not be read.
    #[error("failed to determine network backend: {path}: {source}")]
    BackendUnavailable {
        /// The selector file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The backend selector file names a backend this tool does not
    /// know.
    #[error("unknown network backend {name}")]
    UnknownBackend {
        /// The offending backend name.
        name: String,
    },

    /// Shared infrastructure failure (shell, transactions).
    #[error(transparent)]
    Common(#[from] HostNetError),

    /// Object model failure (cache, queries).
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_display() {
        let err = ReconfigureError::UnknownBackend {
            name: "linuxbridge".to_string(),
        };
        assert_eq!(err.to_string(), "unknown network backend linuxbridge");
    }
}
