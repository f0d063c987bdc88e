//! Error types for pathkv
//!
//! Provides a unified error type for all storage operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using PathKvError
pub type Result<T> = std::result::Result<T, PathKvError>;

/// Unified error type for pathkv operations
#[derive(Debug, Error)]
pub enum PathKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource unavailable: {path}: {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("Path '{0}' is not found")]
    PathNotFound(String),

    // -------------------------------------------------------------------------
    // Type Dispatch Errors
    // -------------------------------------------------------------------------
    #[error("Type {type_name} is not supported: {reason}")]
    UnsupportedType {
        type_name: String,
        reason: &'static str,
    },

    #[error("Only one-dimensional arrays are supported. Got rank {rank} for key {path}")]
    UnsupportedArrayRank { path: String, rank: usize },

    #[error("Failed to parse value at '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PathKvError {
    /// Shorthand for an `UnsupportedType` error naming `T`
    pub(crate) fn unsupported<T: ?Sized>(reason: &'static str) -> Self {
        PathKvError::UnsupportedType {
            type_name: std::any::type_name::<T>().to_string(),
            reason,
        }
    }
}

impl From<bincode::Error> for PathKvError {
    fn from(e: bincode::Error) -> Self {
        PathKvError::Serialization(e.to_string())
    }
}
