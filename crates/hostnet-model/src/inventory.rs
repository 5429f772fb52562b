//! Host inventory file parsing.
//!
//! The inventory is a flat file of `KEY='value'` lines; the model only
//! consumes `INSTALLATION_UUID`, which identifies this host to the
//! management plane.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// Default inventory file location.
pub const INVENTORY_PATH: &str = "/etc/xensource-inventory";

/// Key holding this host's installation identifier.
pub const INSTALLATION_UUID: &str = "INSTALLATION_UUID";

/// Parsed inventory contents.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: BTreeMap<String, String>,
}

impl Inventory {
    /// Parses inventory content.
    ///
    /// Each non-empty line is split at the first `=`; the value is
    /// stripped of surrounding quotes. Lines without a `=` are ignored.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), strip_quotes(value.trim()).to_string());
            }
        }
        Self { entries }
    }

    /// Loads and parses the inventory file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::parse(&content))
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns this host's installation identifier.
    pub fn installation_uuid(&self) -> ModelResult<&str> {
        self.get(INSTALLATION_UUID).ok_or_else(|| ModelError::Inventory {
            path: INVENTORY_PATH.into(),
            message: format!("missing {} entry", INSTALLATION_UUID),
        })
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('\'').unwrap_or(value);
    let value = value.strip_suffix('\'').unwrap_or(value);
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}
