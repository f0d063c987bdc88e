//! Configuration for pathkv
//!
//! Directory layout for named config and cache slots, with sensible defaults.

use std::path::{Path, PathBuf};

/// Layout configuration used by [`StoreManager`](crate::manager::StoreManager)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Directory Layout
    // -------------------------------------------------------------------------
    /// Directory holding config slots (one file per named config)
    pub config_dir: PathBuf,

    /// Directory holding cache slots (one file per named cache)
    pub cache_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Behaviour
    // -------------------------------------------------------------------------
    /// Create missing directories when the manager is constructed
    pub create_dirs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::rooted("./pathkv_data")
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Layout with `config/` and `cache/` under a single root
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            create_dirs: true,
        }
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the directory for config slots
    pub fn config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_dir = path.into();
        self
    }

    /// Set the directory for cache slots
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = path.into();
        self
    }

    /// Whether missing directories are created on open
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.config.create_dirs = create;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
