//! Store configuration.
//!
//! A single [`StoreConfig`] picks the storage medium and its scope, so the
//! same application code runs against a durable LMDB environment or a
//! throwaway in-memory map.
//!
//! ```rust
//! use offline_docstore::config::{MediumKind, StoreConfig};
//!
//! let config = StoreConfig::from_json_str(r#"{"name":"booking","medium":"memory"}"#)?;
//! assert_eq!(config.medium, MediumKind::Memory);
//! assert_eq!(config.scope_prefix, "mock_");
//! # Ok::<(), offline_docstore::error::StoreError>(())
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

pub const DEFAULT_SCOPE_PREFIX: &str = "mock_";
pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediumKind {
    Lmdb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path stem of the database; LMDB stores it under `<name>.lmdb`.
    pub name: String,
    pub medium: MediumKind,
    /// Prepended to every storage key, e.g. `mock_users`.
    pub scope_prefix: String,
    pub map_size: usize,
    /// Seed sample teachers and admin accounts on open.
    pub seed_demo_data: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "offline_docstore".to_string(),
            medium: MediumKind::Lmdb,
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_string(),
            map_size: DEFAULT_MAP_SIZE,
            seed_demo_data: false,
        }
    }
}

impl StoreConfig {
    pub fn lmdb(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self {
            medium: MediumKind::Memory,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!("Loading store configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
