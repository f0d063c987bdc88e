//! Hierarchical text backend
//!
//! Sections of `key=value` pairs plus an unsectioned global scope, persisted
//! as INI text.
//!
//! ## Format
//! ```text
//! version=3            ; global scope (path "version")
//!
//! [App]
//! Name=Demo            ; path "App.Name"
//!
//! [App.Window]
//! size=800,600         ; path "App.Window.size", array flattened to text
//! ```
//!
//! Section names may contain dots, but they are flat names: `App.Window` is
//! not nested inside `App`.

use std::any::Any;
use std::fs;
use std::path::Path;

use crate::backend::{join_array, split_array, Backend, CacheBackend, ConfigBackend};
use crate::capability::Capabilities;
use crate::dispatch::TypeCodec;
use crate::error::{PathKvError, Result};
use crate::path::{join_path, split_path};

/// Ordered key/value pairs of one section (or the global scope)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    entries: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite, keeping the original position of existing keys
    fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }
}

/// INI-backed hierarchical store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniBackend {
    /// Keys addressed without a section
    global: Section,

    /// Named sections in first-seen order
    sections: Vec<(String, Section)>,
}

impl IniBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text
    ///
    /// Blank lines and lines starting with `;` or `#` are skipped. Any other
    /// line must be a `[section]` header or contain `=`. Duplicate keys keep
    /// the last value.
    pub fn parse(text: &str) -> Result<Self> {
        let mut backend = Self::default();
        let mut current: Option<usize> = None;

        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let line_no = index + 1;

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| {
                    PathKvError::Initialization(format!(
                        "line {}: unterminated section header '{}'",
                        line_no, line
                    ))
                })?;
                current = Some(backend.section_index_or_insert(name.trim()));
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                PathKvError::Initialization(format!(
                    "line {}: expected 'key=value', got '{}'",
                    line_no, line
                ))
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(PathKvError::Initialization(format!(
                    "line {}: empty key",
                    line_no
                )));
            }

            let section = match current {
                Some(i) => &mut backend.sections[i].1,
                None => &mut backend.global,
            };
            section.insert(key, value.trim());
        }

        Ok(backend)
    }

    /// Render as INI text: global keys first, then each section
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();

        for (key, value) in &self.global.entries {
            out.push_str(&format!("{}={}\n", key, value));
        }

        for (name, section) in &self.sections {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", name));
            for (key, value) in &section.entries {
                out.push_str(&format!("{}={}\n", key, value));
            }
        }

        out
    }

    /// Section names in first-seen order
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether a section exists (possibly empty)
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, section)| section)
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|(n, _)| n == name) {
            Some(i) => i,
            None => {
                self.sections.push((name.to_string(), Section::default()));
                self.sections.len() - 1
            }
        }
    }

    fn lookup(&self, path: &str) -> Option<&str> {
        let (section, key) = split_path(path);
        if section.is_empty() {
            self.global.get(key)
        } else {
            self.section(section)?.get(key)
        }
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

impl Backend for IniBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::HIERARCHICAL
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_ini_string().into_bytes())
    }

    fn get(&self, path: &str) -> Result<String> {
        self.lookup(path)
            .map(str::to_string)
            .ok_or_else(|| PathKvError::PathNotFound(path.to_string()))
    }

    /// Sections are created on first write
    ///
    /// Paths and values must fit on one line and keys cannot contain `=`,
    /// otherwise the rendered text would not parse back.
    fn set(&mut self, path: &str, value: &str) -> Result<()> {
        let (section, key) = split_path(path);
        if key.is_empty() {
            return Err(PathKvError::Config(format!(
                "path '{}' has an empty key",
                path
            )));
        }
        if has_line_break(path) || has_line_break(value) {
            return Err(PathKvError::Config(format!(
                "path '{}': line breaks cannot be stored in INI text",
                path.escape_debug()
            )));
        }
        if key.contains('=') {
            return Err(PathKvError::Config(format!(
                "path '{}': keys cannot contain '='",
                path
            )));
        }

        if section.is_empty() {
            self.global.insert(key, value);
        } else {
            let index = self.section_index_or_insert(section);
            self.sections[index].1.insert(key, value);
        }
        Ok(())
    }

    fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn paths(&self) -> Vec<String> {
        let global = self.global.entries.iter().map(|(k, _)| k.clone());
        let sectioned = self.sections.iter().flat_map(|(name, section)| {
            section.entries.iter().map(move |(k, _)| join_path(name, k))
        });
        global.chain(sectioned).collect()
    }

    fn remove(&mut self, path: &str) -> bool {
        let (section, key) = split_path(path);
        if section.is_empty() {
            return self.global.remove(key);
        }
        match self.sections.iter_mut().find(|(n, _)| n == section) {
            Some((_, s)) => s.remove(key),
            None => false,
        }
    }

    /// Arrays are flattened to comma-joined text
    fn set_array(&mut self, path: &str, items: &dyn Any, codec: &TypeCodec) -> Result<()> {
        let parts = codec.array_to_text(items)?;
        self.set(path, &join_array(&parts))
    }

    fn get_array(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>> {
        codec.require_text()?;
        let text = self.get(path)?;
        codec.parse_array(path, &split_array(&text))
    }
}

impl ConfigBackend for IniBackend {
    fn init_from_file(&mut self, path: &Path) -> bool {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Cannot read INI file {}: {}", path.display(), e);
                return false;
            }
        };

        match self.init_from_str(&text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Malformed INI file {}: {}", path.display(), e);
                false
            }
        }
    }

    fn init_from_str(&mut self, text: &str) -> Result<()> {
        *self = Self::parse(text)?;
        Ok(())
    }
}

impl CacheBackend for IniBackend {
    fn init_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PathKvError::Initialization(format!("INI data is not UTF-8: {}", e)))?;
        self.init_from_str(text)
    }
}
