//! Backend Module
//!
//! Physical stores behind the typed storage contract.
//!
//! ## Responsibilities
//! - Hold the in-memory representation for one config/cache slot
//! - Declare structural [`Capabilities`] (fixed at construction)
//! - Read/write strings, typed scalars and rank-1 arrays through a [`TypeCodec`]
//! - Serialize the whole representation on demand (no incremental diffing)
//!
//! ## Implementations
//! | backend           | sections | subsections | arrays | on-disk form            |
//! |-------------------|----------|-------------|--------|-------------------------|
//! | [`IniBackend`]    | yes      | no          | no     | INI text                |
//! | [`BinaryBackend`] | no       | no          | yes    | framed bincode map      |
//! | [`LogBackend`]    | no       | no          | yes    | append-only text log    |

mod binary;
mod ini;
mod log;

use std::any::Any;
use std::path::Path;

use crate::capability::Capabilities;
use crate::dispatch::TypeCodec;
use crate::error::Result;

pub use binary::BinaryBackend;
pub use ini::IniBackend;
pub use log::LogBackend;

/// Delimiter used when a backend flattens arrays to text
pub const ARRAY_DELIMITER: char = ',';

/// Storage contract implemented by every backend
///
/// The typed methods receive the value as `&dyn Any` together with the codec
/// of its element type; backends pick the text or binary contract that fits
/// their representation.
pub trait Backend: Send {
    /// Structural features this backend honors
    fn capabilities(&self) -> Capabilities;

    /// Serialize the whole in-memory representation
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Read the string stored at `path`
    fn get(&self, path: &str) -> Result<String>;

    /// Store a string at `path`
    fn set(&mut self, path: &str, value: &str) -> Result<()>;

    /// Whether a value is stored at `path`
    fn contains(&self, path: &str) -> bool;

    /// All stored paths
    fn paths(&self) -> Vec<String>;

    /// Drop the value at `path`, returning whether one existed
    fn remove(&mut self, path: &str) -> bool;

    /// Store a typed scalar
    ///
    /// Default: render with the string contract and store as text.
    fn set_value(&mut self, path: &str, value: &dyn Any, codec: &TypeCodec) -> Result<()> {
        let text = codec.to_text(value)?;
        self.set(path, &text)
    }

    /// Read a typed scalar
    ///
    /// Default: read the text and parse with the string contract.
    fn get_value(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>> {
        codec.require_text()?;
        let text = self.get(path)?;
        codec.parse(path, &text)
    }

    /// Store a rank-1 array (`items` is a `Vec<T>` for the codec's `T`)
    fn set_array(&mut self, path: &str, items: &dyn Any, codec: &TypeCodec) -> Result<()>;

    /// Read a rank-1 array, returned as a boxed `Vec<T>`
    fn get_array(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>>;
}

/// Backend that can be initialized from a file on disk
pub trait ConfigBackend: Backend + Default {
    /// Replace contents with the file at `path`
    ///
    /// Returns false (leaving contents untouched) when the file is missing
    /// or malformed.
    fn init_from_file(&mut self, path: &Path) -> bool;

    /// Replace contents by parsing `text`
    fn init_from_str(&mut self, text: &str) -> Result<()>;
}

/// Backend that can be initialized from a byte blob
pub trait CacheBackend: Backend + Default {
    /// Replace contents with the serialized form produced by `to_bytes`
    fn init_from_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Join array elements with [`ARRAY_DELIMITER`]
///
/// Elements containing the delimiter are not escaped and will split into
/// several elements on read.
pub(crate) fn join_array(parts: &[String]) -> String {
    parts.join(&ARRAY_DELIMITER.to_string())
}

/// Split delimited text into trimmed, non-empty elements
pub(crate) fn split_array(text: &str) -> Vec<&str> {
    text.split(ARRAY_DELIMITER)
        .filter(|part| !part.is_empty())
        .map(str::trim)
        .collect()
}
