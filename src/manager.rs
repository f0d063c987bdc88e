//! Store Manager
//!
//! Named config and cache slots on disk.
//!
//! ## Responsibilities
//! - Resolve slot names to files under the configured directories
//! - Create, load, try-load and clear slots
//! - Attach a persistence hook that rewrites the slot file after every change
//! - Hold an in-memory intermediate cache that is never persisted
//!
//! ## Layout
//! ```text
//!   {config_dir}/{name}    (one file per config slot)
//!   {cache_dir}/{name}     (one file per cache slot)
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::backend::{Backend, BinaryBackend, CacheBackend, ConfigBackend};
use crate::config::StoreConfig;
use crate::error::{PathKvError, Result};
use crate::observable::{ChangeEvent, ObservableStorage};
use crate::specialization::{CacheStore, ConfigStore};

/// Observer that rewrites `path` with the backend's full serialization
pub fn persist_to(
    path: impl Into<PathBuf>,
) -> impl FnMut(&ChangeEvent, &dyn Backend) -> Result<()> + Send + 'static {
    let path = path.into();
    move |event: &ChangeEvent, backend: &dyn Backend| {
        let bytes = backend.to_bytes()?;
        fs::write(&path, &bytes)?;
        tracing::debug!(
            "Persisted {} bytes to {} after change at '{}'",
            bytes.len(),
            path.display(),
            event.path
        );
        Ok(())
    }
}

/// Manages named slots under a [`StoreConfig`] layout
pub struct StoreManager {
    /// Directory layout
    config: StoreConfig,

    /// Session-only cache, created on first access
    intermediate: Option<CacheStore<BinaryBackend>>,
}

impl StoreManager {
    /// Open a manager over `config`
    ///
    /// Creates the slot directories when `config.create_dirs` is set.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.create_dirs {
            fs::create_dir_all(&config.config_dir)?;
            fs::create_dir_all(&config.cache_dir)?;
        }

        Ok(Self {
            config,
            intermediate: None,
        })
    }

    /// Open with `config/` and `cache/` under `root`
    pub fn open_path(root: &Path) -> Result<Self> {
        Self::new(StoreConfig::rooted(root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// File backing the config slot `name`
    pub fn config_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.config.config_dir.join(Self::slot_name(name)?))
    }

    /// File backing the cache slot `name`
    pub fn cache_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.config.cache_dir.join(Self::slot_name(name)?))
    }

    // =========================================================================
    // Config Slots
    // =========================================================================

    /// Whether the config slot file exists
    pub fn has_config(&self, name: &str) -> bool {
        self.config_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Create an empty config slot, replacing any existing file
    pub fn make_config<B: ConfigBackend>(&self, name: &str) -> Result<ConfigStore<B>> {
        let path = self.config_path(name)?;
        Self::reset_file(&path)?;

        tracing::debug!("Created config slot '{}' at {}", name, path.display());
        Ok(ConfigStore::<B>::default().observed_by(persist_to(path)))
    }

    /// Load an existing config slot
    ///
    /// Missing file → `ResourceUnavailable`; unparsable file → `Initialization`.
    pub fn load_config<B: ConfigBackend>(&self, name: &str) -> Result<ConfigStore<B>> {
        let path = self.config_path(name)?;
        Self::require_file(&path, "config", name)?;

        let mut backend = B::default();
        if !backend.init_from_file(&path) {
            return Err(PathKvError::Initialization(format!(
                "Failed to initialize config '{}' with type '{}' from {}",
                name,
                std::any::type_name::<B>(),
                path.display()
            )));
        }

        Ok(ObservableStorage::new(backend).observed_by(persist_to(path)))
    }

    /// Load a config slot, or `None` if it is missing or malformed
    pub fn try_load_config<B: ConfigBackend>(&self, name: &str) -> Option<ConfigStore<B>> {
        match self.load_config(name) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("Config slot '{}' not loaded: {}", name, e);
                None
            }
        }
    }

    /// Load the config slot if it exists, otherwise create it
    pub fn make_or_load_config<B: ConfigBackend>(&self, name: &str) -> Result<ConfigStore<B>> {
        if self.has_config(name) {
            self.load_config(name)
        } else {
            self.make_config(name)
        }
    }

    // =========================================================================
    // Cache Slots
    // =========================================================================

    /// Whether the cache slot file exists
    pub fn has_cache(&self, name: &str) -> bool {
        self.cache_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Create an empty cache slot, replacing any existing file
    pub fn make_cache<B: CacheBackend>(&self, name: &str) -> Result<CacheStore<B>> {
        let path = self.cache_path(name)?;
        Self::reset_file(&path)?;

        tracing::debug!("Created cache slot '{}' at {}", name, path.display());
        Ok(CacheStore::<B>::default().observed_by(persist_to(path)))
    }

    /// Load an existing cache slot from its bytes
    pub fn load_cache<B: CacheBackend>(&self, name: &str) -> Result<CacheStore<B>> {
        let path = self.cache_path(name)?;
        Self::require_file(&path, "cache", name)?;

        let bytes = fs::read(&path)?;
        let store = CacheStore::<B>::from_bytes(&bytes)?;
        Ok(store.observed_by(persist_to(path)))
    }

    /// Load a cache slot, or `None` if it is missing or malformed
    pub fn try_load_cache<B: CacheBackend>(&self, name: &str) -> Option<CacheStore<B>> {
        match self.load_cache(name) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("Cache slot '{}' not loaded: {}", name, e);
                None
            }
        }
    }

    /// Load the cache slot if it exists, otherwise create it
    pub fn make_or_load_cache<B: CacheBackend>(&self, name: &str) -> Result<CacheStore<B>> {
        if self.has_cache(name) {
            self.load_cache(name)
        } else {
            self.make_cache(name)
        }
    }

    /// Delete the cache slot file, returning whether it existed
    pub fn clear_cache(&self, name: &str) -> Result<bool> {
        let path = self.cache_path(name)?;
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)?;
        tracing::debug!("Cleared cache slot '{}'", name);
        Ok(true)
    }

    // =========================================================================
    // Intermediate Cache
    // =========================================================================

    /// Session-only cache, never written to disk
    pub fn intermediate_cache(&mut self) -> &mut CacheStore<BinaryBackend> {
        self.intermediate.get_or_insert_with(CacheStore::default)
    }

    /// Replace the session-only cache
    pub fn set_intermediate_cache(&mut self, cache: CacheStore<BinaryBackend>) {
        self.intermediate = Some(cache);
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Slot names are single file names
    fn slot_name(name: &str) -> Result<&str> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(PathKvError::Config(format!("invalid slot name '{}'", name)));
        }
        Ok(name)
    }

    fn reset_file(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        File::create(path)?;
        Ok(())
    }

    fn require_file(path: &Path, kind: &str, name: &str) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        Err(PathKvError::ResourceUnavailable {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} '{}' is not found", kind, name),
            ),
        })
    }
}
