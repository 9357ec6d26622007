use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryStore;
use crate::redb_store::RedbStore;
use crate::traits::DurableStore;

/// Storage engine selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Volatile `BTreeMap` store, for tests and demos.
    Memory,
    /// redb database file.
    #[default]
    Redb,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub path: PathBuf,
    pub create_dirs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Redb,
            path: PathBuf::from("speakerbob.redb"),
            create_dirs: true,
        }
    }
}

impl StoreConfig {
    /// A config for a volatile in-memory store.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Open the process-wide store handle described by `config`.
///
/// The returned handle is meant to be constructed once at startup and
/// passed to every provider.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn DurableStore>> {
    match config.backend {
        Backend::Memory => Ok(Arc::new(InMemoryStore::new())),
        Backend::Redb => {
            if config.create_dirs {
                if let Some(parent) = config.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
            }
            Ok(Arc::new(RedbStore::open(&config.path)?))
        }
    }
}
