//! Path addressing
//!
//! A path is a dot-separated string. The last segment is the key; everything
//! before the last dot is the section qualifier.

/// Split `path` at its last dot into `(section, key)`
///
/// A path without a dot has an empty section (global scope).
///
/// ```
/// use pathkv::path::split_path;
///
/// assert_eq!(split_path("App.Window.width"), ("App.Window", "width"));
/// assert_eq!(split_path("name"), ("", "name"));
/// ```
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('.') {
        Some(dot) => (&path[..dot], &path[dot + 1..]),
        None => ("", path),
    }
}

/// Join a section and key back into a path
pub fn join_path(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", section, key)
    }
}
