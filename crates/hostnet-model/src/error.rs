//! Error types for the network object model.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by cache construction, the XML codec, and topology
/// queries.
///
/// Data-consistency variants (unknown element, malformed boolean,
/// ambiguous lookups) indicate that the management-plane snapshot and
/// this tool's schema have drifted; they are fatal and never retried.
/// Expected absences (a PIF that simply is not in any bond) are `Option`
/// returns on the cache, not errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The cache document contains an element tag this schema does not
    /// know.
    #[error("Unknown element '{name}' in network cache")]
    UnknownElement {
        /// The offending element tag.
        name: String,
    },

    /// A free-form setting key is not in the entity's allow-list.
    ///
    /// Raised on encode only; decode skips unknown keys so that old or
    /// future cache files stay readable.
    #[error("Unknown {entity} setting '{name}'")]
    UnknownSetting {
        /// The entity type being encoded.
        entity: &'static str,
        /// The offending setting key.
        name: String,
    },

    /// A boolean field held something other than "True"/"False".
    #[error("Malformed boolean '{value}'")]
    MalformedBoolean {
        /// The offending value.
        value: String,
    },

    /// A typed field held an unparseable value.
    #[error("Malformed {field} value '{value}'")]
    MalformedValue {
        /// The field name.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// An entity element is missing its `ref` attribute.
    #[error("Element '{element}' is missing its ref attribute")]
    MissingRef {
        /// The element tag.
        element: String,
    },

    /// The cache XML could not be parsed at all.
    #[error("Failed to parse network cache XML: {message}")]
    Xml {
        /// Parser error message.
        message: String,
    },

    /// A PIF-by-uuid lookup did not match exactly one record.
    #[error("PIF lookup by uuid '{uuid}' matched {matches} records")]
    PifUuidLookup {
        /// The uuid looked up.
        uuid: String,
        /// How many records matched.
        matches: usize,
    },

    /// No network in the cache carries the given bridge name.
    #[error("No network has bridge '{bridge}'")]
    UnknownBridge {
        /// The bridge name looked up.
        bridge: String,
    },

    /// A bridge name did not resolve to exactly one PIF on this host.
    #[error("Bridge '{bridge}' maps to {matches} PIFs on this host")]
    BridgePifLookup {
        /// The bridge name looked up.
        bridge: String,
        /// How many PIFs matched.
        matches: usize,
    },

    /// A record that is assumed always present was absent.
    #[error("{kind} record {reference} not found")]
    MissingRecord {
        /// The record kind (PIF, Network, VLAN).
        kind: &'static str,
        /// The opaque reference that failed to resolve.
        reference: String,
    },

    /// A PIF is master of more than one bond.
    #[error("PIF {pif} is master of {count} bonds")]
    MultipleBonds {
        /// The offending PIF reference.
        pif: String,
        /// How many bonds it masters.
        count: usize,
    },

    /// A VLAN-physical derivation was requested on a non-VLAN PIF.
    #[error("PIF {pif} is not a VLAN master")]
    NotVlanMaster {
        /// The offending PIF reference.
        pif: String,
    },

    /// The host inventory file is missing or malformed.
    #[error("Inventory file {path}: {message}")]
    Inventory {
        /// The inventory file path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The management API reported a failure.
    #[error("Management API error: {message}")]
    Api {
        /// Error message.
        message: String,
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
}

impl ModelError {
    /// Creates an XML parse/serialize error from any displayable source.
    pub fn xml(source: impl fmt::Display) -> Self {
        Self::Xml {
            message: source.to_string(),
        }
    }

    /// Creates a management API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_display() {
        let err = ModelError::PifUuidLookup {
            uuid: "4f7e…".to_string(),
            matches: 2,
        };
        assert!(err.to_string().contains("matched 2 records"));
    }

    #[test]
    fn test_unknown_setting_display() {
        let err = ModelError::UnknownSetting {
            entity: "PIF",
            name: "nagle".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown PIF setting 'nagle'");
    }
}
