//! Runtime configuration store.
//!
//! Target references (which cluster, which service) and the ledger
//! location are looked up by name at runtime instead of being compiled
//! in. The daemon seeds a [`MemoryConfigStore`] from flags or loads a
//! [`FileConfigStore`] from a flat TOML table of strings.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Well-known configuration names.
pub mod keys {
    /// Cluster reference the intake resolves targets against.
    pub const CLUSTER_REF: &str = "cluster-ref";
    /// Service reference the intake resolves targets against.
    pub const SERVICE_REF: &str = "service-ref";
    /// Filesystem path of the request ledger.
    pub const LEDGER_PATH: &str = "ledger-path";
}

/// Name→value resolution — injected for testability.
pub trait ConfigStore: Send + Sync {
    /// Fetch one configuration value by name.
    fn get(&self, name: &str) -> ConfigResult<String>;
}

// ── Memory-backed store ───────────────────────────────────────────

/// Config store seeded programmatically (daemon flags, tests).
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    values: HashMap<String, String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, name: &str) -> ConfigResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }
}

// ── File-backed store ─────────────────────────────────────────────

/// Config store loaded once from a TOML file of `name = "value"` pairs.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    values: HashMap<String, String>,
}

impl FileConfigStore {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Unreadable(format!("{}: {e}", path.as_ref().display())))?;
        let values: HashMap<String, String> =
            toml::from_str(&raw).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        Ok(Self { values })
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, name: &str) -> ConfigResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }
}
