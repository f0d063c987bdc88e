//! # pathkv
//!
//! Path-addressed, typed key/value storage for application configuration
//! and caching:
//! - Dotted paths (`App.Window.Width`) over pluggable backends
//! - Typed scalars and rank-1 arrays through a runtime type registry
//! - Homogeneous and heterogeneous batch writes with memoized dispatch
//! - Change notification, used to persist every write back to disk
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StoreManager                          │
//! │         (named config/cache slots, persistence hook)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          ObservableStorage  (ConfigStore / CacheStore)      │
//! │                 ChangeEvent ──► observers                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Storage                             │
//! │        Dispatcher (TypeId → BoundSetter, memoized)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌────────────┐ ┌──────────┐ ┌──────────┐
//!   │ IniBackend │ │  Binary  │ │   Log    │
//!   │ (sections) │ │  (flat)  │ │ (append) │
//!   └────────────┘ └──────────┘ └──────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use pathkv::ConfigStore;
//!
//! let mut config: ConfigStore = ConfigStore::default();
//! config.set("App.Width", 800i32).unwrap();
//! config.set_array("App.Tags", vec!["a".to_string(), "b".to_string()]).unwrap();
//!
//! assert_eq!(config.get::<i32>("App.Width").unwrap(), 800);
//! assert_eq!(config.get_str("App.Tags").unwrap(), "a,b");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod capability;
pub mod path;
pub mod value;
pub mod dispatch;
pub mod backend;
pub mod storage;
pub mod observable;
pub mod specialization;
pub mod manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PathKvError, Result};
pub use config::StoreConfig;

pub use backend::{Backend, BinaryBackend, CacheBackend, ConfigBackend, IniBackend, LogBackend};
pub use capability::Capabilities;
pub use dispatch::{dynamic, register, register_parsable, register_serde, DynValue, TypeRegistry};
pub use manager::StoreManager;
pub use observable::{ChangeEvent, ObservableStorage, SubscriptionId};
pub use specialization::{CacheStore, ConfigStore};
pub use storage::Storage;
pub use value::ParsableFromString;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pathkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
