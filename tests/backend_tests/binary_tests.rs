//! Tests for BinaryBackend
//!
//! These tests verify:
//! - Typed values survive serialization to the framed container
//! - Arrays are natively supported
//! - Corrupt or foreign containers are rejected
//! - Cache store lifecycle through a file

use std::fs;

use pathkv::{Backend, BinaryBackend, CacheStore, Capabilities, PathKvError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn populated_cache() -> CacheStore {
    let mut cache: CacheStore = CacheStore::default();
    cache.set("count", 42i32).unwrap();
    cache.set_str("name", "cache").unwrap();
    cache.set_array("ids", vec![7u64, 8, 9]).unwrap();
    cache
}

// =============================================================================
// Basic Tests
// =============================================================================

#[test]
fn test_capabilities() {
    let backend = BinaryBackend::new();
    assert_eq!(backend.capabilities(), Capabilities::FLAT);
    assert!(backend.capabilities().supports_arrays());
    assert!(!backend.capabilities().supports_sections());
}

#[test]
fn test_paths_are_flat() {
    let mut backend = BinaryBackend::new();
    backend.set("App.Name", "Demo").unwrap();

    assert_eq!(backend.paths(), vec!["App.Name".to_string()]);
    assert!(!backend.contains("Name"));
}

#[test]
fn test_missing_path() {
    let cache: CacheStore = CacheStore::default();
    assert!(matches!(cache.get::<i32>("absent"), Err(PathKvError::PathNotFound(_))));
}

#[test]
fn test_remove() {
    let mut cache = populated_cache();
    assert!(cache.remove("count"));
    assert!(!cache.contains("count"));
    assert_eq!(cache.backend().len(), 2);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_bytes_roundtrip() {
    let cache = populated_cache();
    let bytes = cache.to_bytes().unwrap();

    let restored: CacheStore = CacheStore::from_bytes(&bytes).unwrap();
    assert_eq!(restored.get::<i32>("count").unwrap(), 42);
    assert_eq!(restored.get_str("name").unwrap(), "cache");
    assert_eq!(restored.get_array::<u64>("ids").unwrap(), vec![7, 8, 9]);
}

#[test]
fn test_cache_file_lifecycle() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.bin");

    let mut cache: CacheStore = CacheStore::default();
    cache.set("count", 42i32).unwrap();
    fs::write(&path, cache.to_bytes().unwrap()).unwrap();

    let bytes = fs::read(&path).unwrap();
    let mut reopened: CacheStore = CacheStore::default();
    reopened.init_from_bytes(&bytes).unwrap();
    assert_eq!(reopened.get::<i32>("count").unwrap(), 42);
}

#[test]
fn test_empty_bytes_is_empty_store() {
    let cache: CacheStore = CacheStore::from_bytes(&[]).unwrap();
    assert!(cache.paths().is_empty());
}

#[test]
fn test_corrupt_container_rejected() {
    let mut bytes = populated_cache().to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    assert!(matches!(
        CacheStore::<BinaryBackend>::from_bytes(&bytes),
        Err(PathKvError::Initialization(_))
    ));
}

#[test]
fn test_foreign_bytes_rejected() {
    let result = BinaryBackend::from_bytes(b"[App]\nName=Demo\n");
    assert!(matches!(result, Err(PathKvError::Initialization(_))));
}

#[test]
fn test_truncated_header_rejected() {
    let bytes = populated_cache().to_bytes().unwrap();
    assert!(BinaryBackend::from_bytes(&bytes[..6]).is_err());
}

#[test]
fn test_failed_init_keeps_contents() {
    let mut cache = populated_cache();
    assert!(cache.init_from_bytes(b"not a container").is_err());
    assert_eq!(cache.get::<i32>("count").unwrap(), 42);
}

#[test]
fn test_non_text_blob_is_not_read_as_text() {
    let mut cache: CacheStore = CacheStore::default();
    cache.set("n", 0u64).unwrap();
    cache.set_array("ids", vec![1u32]).unwrap();

    assert!(matches!(cache.get_str("n"), Err(PathKvError::Serialization(_))));
    assert!(matches!(cache.get_str("ids"), Err(PathKvError::Serialization(_))));
    assert_eq!(cache.get::<u64>("n").unwrap(), 0);
}

#[test]
fn test_scalar_read_with_other_type_fails() {
    let mut cache: CacheStore = CacheStore::default();
    cache.set("n", 7u64).unwrap();

    assert!(cache.get::<i64>("n").is_err());
    assert!(cache.get_array::<u64>("n").is_err());
    assert_eq!(cache.backend().tag("n"), Some("u64"));
}

#[test]
fn test_text_blobs_parse_into_typed_values() {
    let mut cache: CacheStore = CacheStore::default();
    cache.set_str("port", "8080").unwrap();
    cache.set("title", "Main".to_string()).unwrap();

    assert_eq!(cache.get::<u16>("port").unwrap(), 8080);
    assert_eq!(cache.get_str("title").unwrap(), "Main");
    assert_eq!(cache.get::<String>("port").unwrap(), "8080");
}

#[test]
fn test_type_mismatch_on_read() {
    let cache = populated_cache();
    // A string blob does not decode as an array of u64
    assert!(cache.get_array::<u64>("name").is_err());
}
