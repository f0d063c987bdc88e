//! Config and cache stores
//!
//! Both are [`ObservableStorage`] with identical storage semantics; they
//! differ only in how they are initialized. A config store loads from a file
//! and renders back to text, a cache store loads from a byte blob.

use std::path::Path;

use crate::backend::{BinaryBackend, CacheBackend, ConfigBackend, IniBackend};
use crate::error::{PathKvError, Result};
use crate::observable::ObservableStorage;

/// File-initialized, text-serializable store (INI by default)
pub type ConfigStore<B = IniBackend> = ObservableStorage<B>;

/// Byte-initialized store (flat binary by default)
pub type CacheStore<B = BinaryBackend> = ObservableStorage<B>;

impl<B: ConfigBackend> ObservableStorage<B> {
    /// Load from `path`, starting empty when the file is missing or malformed
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let mut store = Self::default();
        store.init_from_file(path);
        store
    }

    /// Replace contents with the file at `path`
    ///
    /// Returns false (contents untouched) when the file cannot be loaded.
    pub fn init_from_file(&mut self, path: impl AsRef<Path>) -> bool {
        self.backend_mut().init_from_file(path.as_ref())
    }

    /// Replace contents by parsing `text`
    pub fn init_from_str(&mut self, text: &str) -> Result<()> {
        self.backend_mut().init_from_str(text)
    }

    /// Serialized contents as UTF-8 text
    pub fn stringified_data(&self) -> Result<String> {
        String::from_utf8(self.to_bytes()?)
            .map_err(|e| PathKvError::Serialization(format!("store is not text: {}", e)))
    }
}

impl<B: CacheBackend> ObservableStorage<B> {
    /// Build from bytes produced by `to_bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut store = Self::default();
        store.init_from_bytes(bytes)?;
        Ok(store)
    }

    /// Replace contents with bytes produced by `to_bytes`
    pub fn init_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.backend_mut().init_from_bytes(bytes)
    }
}
