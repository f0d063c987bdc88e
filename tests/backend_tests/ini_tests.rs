//! Tests for IniBackend
//!
//! These tests verify:
//! - Parsing sections, global keys and comments
//! - Rendering back to INI text in insertion order
//! - Array flattening and its comma limitation
//! - Missing paths and malformed input
//! - Config store lifecycle (set, serialize, reload)

use std::fs;

use pathkv::{
    Backend, Capabilities, ConfigBackend, ConfigStore, IniBackend, PathKvError, StoreConfig,
    StoreManager,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const SAMPLE: &str = "\
; generated
version=3

[App]
Name=Demo
Width = 800

[App.Window]
size=800,600
";

fn sample_backend() -> IniBackend {
    IniBackend::parse(SAMPLE).unwrap()
}

// =============================================================================
// Parse Tests
// =============================================================================

#[test]
fn test_capabilities() {
    let backend = IniBackend::new();
    assert_eq!(backend.capabilities(), Capabilities::HIERARCHICAL);
    assert!(backend.capabilities().supports_sections());
    assert!(!backend.capabilities().supports_arrays());
}

#[test]
fn test_parse_sections_and_global() {
    let backend = sample_backend();

    assert_eq!(backend.get("version").unwrap(), "3");
    assert_eq!(backend.get("App.Name").unwrap(), "Demo");
    assert_eq!(backend.get("App.Width").unwrap(), "800");
    assert_eq!(backend.get("App.Window.size").unwrap(), "800,600");
    assert_eq!(backend.section_names(), vec!["App", "App.Window"]);
}

#[test]
fn test_duplicate_keys_last_wins() {
    let backend = IniBackend::parse("[S]\nk=1\nk=2\n").unwrap();
    assert_eq!(backend.get("S.k").unwrap(), "2");
    assert_eq!(backend.paths(), vec!["S.k".to_string()]);
}

#[test]
fn test_malformed_line_reports_line_number() {
    let result = IniBackend::parse("[S]\nk=1\nnot a pair\n");
    match result {
        Err(PathKvError::Initialization(message)) => assert!(message.contains("line 3")),
        other => panic!("expected initialization error, got {:?}", other),
    }
}

#[test]
fn test_unterminated_header_rejected() {
    assert!(matches!(
        IniBackend::parse("[Broken\nk=v\n"),
        Err(PathKvError::Initialization(_))
    ));
}

// =============================================================================
// Get/Set Tests
// =============================================================================

#[test]
fn test_missing_path() {
    let backend = sample_backend();

    match backend.get("App.Missing") {
        Err(PathKvError::PathNotFound(path)) => assert_eq!(path, "App.Missing"),
        other => panic!("expected PathNotFound, got {:?}", other),
    }
    assert!(matches!(backend.get("Nope.x"), Err(PathKvError::PathNotFound(_))));
    assert!(!backend.contains("App.Missing"));
}

#[test]
fn test_set_creates_section() {
    let mut backend = IniBackend::new();
    backend.set("Server.Port", "8080").unwrap();

    assert!(backend.has_section("Server"));
    assert_eq!(backend.get("Server.Port").unwrap(), "8080");
}

#[test]
fn test_global_path_has_no_section() {
    let mut backend = IniBackend::new();
    backend.set("debug", "true").unwrap();

    assert!(backend.section_names().is_empty());
    assert_eq!(backend.to_ini_string(), "debug=true\n");
}

#[test]
fn test_empty_key_rejected() {
    let mut backend = IniBackend::new();
    assert!(matches!(backend.set("Section.", "x"), Err(PathKvError::Config(_))));
}

#[test]
fn test_line_breaks_rejected() {
    let mut backend = IniBackend::new();

    for value in ["line1\nline2", "line1\r\nline2", "trailing\r"] {
        assert!(matches!(backend.set("App.Motd", value), Err(PathKvError::Config(_))));
    }
    assert!(matches!(backend.set("App.Bad\nKey", "v"), Err(PathKvError::Config(_))));
    assert!(matches!(backend.set("Bad\nSection.key", "v"), Err(PathKvError::Config(_))));
    assert!(backend.paths().is_empty());
}

#[test]
fn test_key_with_equals_rejected() {
    let mut backend = IniBackend::new();
    assert!(matches!(backend.set("App.a=b", "v"), Err(PathKvError::Config(_))));
}

#[test]
fn test_rejected_write_keeps_file_loadable() {
    let temp = TempDir::new().unwrap();
    let manager = StoreManager::new(StoreConfig::rooted(temp.path())).unwrap();

    let mut store = manager.make_config::<IniBackend>("app.ini").unwrap();
    store.set_str("App.Name", "Demo").unwrap();
    assert!(store.set("App.Motd", "line1\nline2".to_string()).is_err());
    assert!(!store.contains("App.Motd"));

    let reloaded = manager.load_config::<IniBackend>("app.ini").unwrap();
    assert_eq!(reloaded.get_str("App.Name").unwrap(), "Demo");
}

#[test]
fn test_remove() {
    let mut backend = sample_backend();

    assert!(backend.remove("App.Name"));
    assert!(!backend.remove("App.Name"));
    assert!(!backend.contains("App.Name"));
    assert!(backend.remove("version"));
}

// =============================================================================
// Render Tests
// =============================================================================

#[test]
fn test_render_order() {
    let mut backend = IniBackend::new();
    backend.set("B.one", "1").unwrap();
    backend.set("top", "t").unwrap();
    backend.set("A.two", "2").unwrap();
    backend.set("B.three", "3").unwrap();

    assert_eq!(
        backend.to_ini_string(),
        "top=t\n\n[B]\none=1\nthree=3\n\n[A]\ntwo=2\n"
    );
}

#[test]
fn test_render_then_parse_is_stable() {
    let backend = sample_backend();
    let reparsed = IniBackend::parse(&backend.to_ini_string()).unwrap();
    assert_eq!(backend, reparsed);
}

// =============================================================================
// Array Tests
// =============================================================================

#[test]
fn test_array_text_form() {
    let mut store: ConfigStore = ConfigStore::default();
    store.set_array("List.Names", vec!["a".to_string(), "b".to_string()]).unwrap();

    assert_eq!(store.get_str("List.Names").unwrap(), "a,b");
    assert_eq!(
        store.get_array::<String>("List.Names").unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
}

#[test]
fn test_array_read_drops_empty_and_trims() {
    let mut store: ConfigStore = ConfigStore::default();
    store.set_str("List.Numbers", " 1, 2,,3 ").unwrap();
    assert_eq!(store.get_array::<i32>("List.Numbers").unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_array_element_with_comma_splits() {
    let mut store: ConfigStore = ConfigStore::default();
    store
        .set_array("List.Names", vec!["x,y".to_string(), "z".to_string()])
        .unwrap();

    // Elements are not escaped
    assert_eq!(store.get_array::<String>("List.Names").unwrap().len(), 3);
}

#[test]
fn test_array_parse_failure() {
    let mut store: ConfigStore = ConfigStore::default();
    store.set_str("List.Numbers", "1,two,3").unwrap();
    assert!(matches!(
        store.get_array::<i32>("List.Numbers"),
        Err(PathKvError::Parse { .. })
    ));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_config_store_lifecycle() {
    let mut store: ConfigStore = ConfigStore::default();
    store.set_str("App.Name", "Demo").unwrap();

    let text = store.stringified_data().unwrap();
    assert_eq!(text, "[App]\nName=Demo\n");

    let mut reloaded: ConfigStore = ConfigStore::default();
    reloaded.init_from_str(&text).unwrap();
    assert_eq!(reloaded.get_str("App.Name").unwrap(), "Demo");
}

#[test]
fn test_init_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.ini");
    fs::write(&path, SAMPLE).unwrap();

    let store: ConfigStore = ConfigStore::from_file(&path);
    assert_eq!(store.get::<i32>("App.Width").unwrap(), 800);
}

#[test]
fn test_init_from_missing_file_keeps_contents() {
    let temp = TempDir::new().unwrap();

    let mut backend = sample_backend();
    assert!(!backend.init_from_file(&temp.path().join("absent.ini")));
    assert_eq!(backend.get("App.Name").unwrap(), "Demo");

    let store: ConfigStore = ConfigStore::from_file(temp.path().join("absent.ini"));
    assert!(store.paths().is_empty());
}

#[test]
fn test_init_from_malformed_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.ini");
    fs::write(&path, "garbage line\n").unwrap();

    let mut backend = IniBackend::new();
    assert!(!backend.init_from_file(&path));
}
