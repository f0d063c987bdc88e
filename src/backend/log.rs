//! Streaming log backend
//!
//! Append-only text entries over a single owned file handle. Writes always
//! land at the end of the file; snapshots seek to the start and read
//! everything. Both go through one `Mutex`, so a snapshot never observes a
//! half-written entry.
//!
//! This is a narrower contract than the other backends: values can be read
//! back from `key=value` entries, but every setter is rejected.

use std::any::Any;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::backend::{split_array, Backend};
use crate::capability::Capabilities;
use crate::dispatch::TypeCodec;
use crate::error::{PathKvError, Result};

/// Append-only log file
pub struct LogBackend {
    /// Location of the log file
    path: PathBuf,

    /// Read + append handle; guards every read and write
    file: Mutex<File>,
}

impl LogBackend {
    /// Open (or create) the log file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| PathKvError::ResourceUnavailable {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the log file
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn append(&self, entry: &str) -> Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{}", entry)?;
        file.flush()?;
        Ok(())
    }

    /// Append a `key=value` entry readable through [`Backend::get`]
    pub fn record(&self, key: &str, value: &str) -> Result<()> {
        self.append(&format!("{}={}", key, value))
    }

    /// Entire accumulated text
    pub fn snapshot(&self) -> Result<String> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut text = String::new();
        file.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Truncate the log, returning the number of lines dropped
    pub fn clear(&self) -> Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut text = String::new();
        file.read_to_string(&mut text)?;
        file.set_len(0)?;

        Ok(text.lines().count())
    }

    fn rejected(&self, operation: &str) -> PathKvError {
        PathKvError::NotSupported(format!(
            "{} on append-only log {}",
            operation,
            self.path.display()
        ))
    }
}

/// Parse a `key=value` entry
fn entry(line: &str) -> Option<(&str, &str)> {
    line.split_once('=').map(|(k, v)| (k.trim(), v.trim()))
}

impl Backend for LogBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FLAT
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.snapshot()?.into_bytes())
    }

    /// Value of the most recent `path=value` entry
    fn get(&self, path: &str) -> Result<String> {
        let text = self.snapshot()?;
        text.lines()
            .rev()
            .filter_map(entry)
            .find(|(key, _)| *key == path)
            .map(|(_, value)| value.to_string())
            .ok_or_else(|| PathKvError::PathNotFound(path.to_string()))
    }

    fn set(&mut self, _path: &str, _value: &str) -> Result<()> {
        Err(self.rejected("set"))
    }

    fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Distinct entry keys in first-seen order
    fn paths(&self) -> Vec<String> {
        let text = match self.snapshot() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Cannot read log {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let mut keys: Vec<String> = Vec::new();
        for (key, _) in text.lines().filter_map(entry) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        keys
    }

    /// Entries are never removed individually
    fn remove(&mut self, _path: &str) -> bool {
        false
    }

    fn set_value(&mut self, _path: &str, _value: &dyn Any, _codec: &TypeCodec) -> Result<()> {
        Err(self.rejected("set_value"))
    }

    fn set_array(&mut self, _path: &str, _items: &dyn Any, _codec: &TypeCodec) -> Result<()> {
        Err(self.rejected("set_array"))
    }

    fn get_array(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>> {
        codec.require_text()?;
        let text = self.get(path)?;
        codec.parse_array(path, &split_array(&text))
    }
}
