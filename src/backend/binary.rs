//! Flat binary backend
//!
//! Path → tagged serialized blob. No sections and no global scope: every path
//! is an opaque key.
//!
//! ## Container Format
//! ```text
//! ┌──────────┬─────────────┬───────────┬──────────────────────────────────────┐
//! │Magic (4) │ Version (2) │  CRC (4)  │ Payload                              │
//! │  "PKVB"  │   u16 LE    │  u32 LE   │ bincode(BTreeMap<path, (tag, blob)>) │
//! └──────────┴─────────────┴───────────┴──────────────────────────────────────┘
//! ```
//! The CRC covers the payload only. An empty input decodes to an empty store.
//!
//! ## Tags
//! Every blob records how it was written:
//! - `text` / `text[]`: bincode of the invariant text (strings, parsable-only types)
//! - `<type name>` / `<type name>[]`: the type's serde encoding
//!
//! Reads with a codec whose tag differs fail instead of reinterpreting bytes.
//! Type names come from `std::any::type_name`.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, CacheBackend, ConfigBackend};
use crate::capability::Capabilities;
use crate::dispatch::TypeCodec;
use crate::error::{PathKvError, Result};

/// Magic bytes identifying a pathkv binary container
const MAGIC: &[u8; 4] = b"PKVB";

/// Current container format version
const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + CRC (4) = 10 bytes
const HEADER_SIZE: usize = 10;

/// Tag of blobs holding invariant text
const TEXT_TAG: &str = "text";

/// One stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    tag: String,
    blob: Vec<u8>,
}

impl Entry {
    fn is_text(&self) -> bool {
        self.tag == TEXT_TAG || self.tag == type_name::<String>()
    }

    fn is_text_array(&self) -> bool {
        self.tag == array_tag(TEXT_TAG) || self.tag == array_tag(type_name::<String>())
    }
}

fn scalar_tag(codec: &TypeCodec) -> &'static str {
    if codec.has_binary() {
        codec.type_name()
    } else {
        TEXT_TAG
    }
}

fn array_tag(scalar: &str) -> String {
    format!("{}[]", scalar)
}

/// Flat store of tagged serialized blobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryBackend {
    store: BTreeMap<String, Entry>,
}

impl BinaryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a container produced by [`Backend::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            store: decode_container(bytes)?,
        })
    }

    /// Raw blob stored at `path`
    pub fn raw(&self, path: &str) -> Option<&[u8]> {
        self.store.get(path).map(|entry| entry.blob.as_slice())
    }

    /// Tag recorded for the blob at `path`
    pub fn tag(&self, path: &str) -> Option<&str> {
        self.store.get(path).map(|entry| entry.tag.as_str())
    }

    /// Number of stored paths
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn entry(&self, path: &str) -> Result<&Entry> {
        self.store
            .get(path)
            .ok_or_else(|| PathKvError::PathNotFound(path.to_string()))
    }

    fn insert(&mut self, path: &str, tag: String, blob: Vec<u8>) {
        self.store.insert(path.to_string(), Entry { tag, blob });
    }
}

fn tag_mismatch(path: &str, entry: &Entry, requested: &str) -> PathKvError {
    PathKvError::Serialization(format!(
        "value at '{}' is stored as '{}', requested '{}'",
        path, entry.tag, requested
    ))
}

impl Backend for BinaryBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FLAT
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_container(&self.store)
    }

    /// Text of a string or parsable-only value; other blobs are rejected
    fn get(&self, path: &str) -> Result<String> {
        let entry = self.entry(path)?;
        if !entry.is_text() {
            return Err(tag_mismatch(path, entry, TEXT_TAG));
        }
        Ok(bincode::deserialize(&entry.blob)?)
    }

    fn set(&mut self, path: &str, value: &str) -> Result<()> {
        self.insert(path, TEXT_TAG.to_string(), bincode::serialize(value)?);
        Ok(())
    }

    fn contains(&self, path: &str) -> bool {
        self.store.contains_key(path)
    }

    fn paths(&self) -> Vec<String> {
        self.store.keys().cloned().collect()
    }

    fn remove(&mut self, path: &str) -> bool {
        self.store.remove(path).is_some()
    }

    fn set_value(&mut self, path: &str, value: &dyn Any, codec: &TypeCodec) -> Result<()> {
        let blob = codec.encode(value)?;
        self.insert(path, scalar_tag(codec).to_string(), blob);
        Ok(())
    }

    /// Text blobs are parsed when the type offers the string contract
    fn get_value(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>> {
        let entry = self.entry(path)?;
        let expected = scalar_tag(codec);

        if entry.tag == expected {
            codec.decode(path, &entry.blob)
        } else if entry.is_text() && codec.has_text() {
            let text: String = bincode::deserialize(&entry.blob)?;
            codec.parse(path, &text)
        } else {
            Err(tag_mismatch(path, entry, expected))
        }
    }

    fn set_array(&mut self, path: &str, items: &dyn Any, codec: &TypeCodec) -> Result<()> {
        let blob = codec.encode_array(items)?;
        self.insert(path, array_tag(scalar_tag(codec)), blob);
        Ok(())
    }

    fn get_array(&self, path: &str, codec: &TypeCodec) -> Result<Box<dyn Any>> {
        let entry = self.entry(path)?;
        let expected = array_tag(scalar_tag(codec));

        if entry.tag == expected {
            codec.decode_array(path, &entry.blob)
        } else if entry.is_text_array() && codec.has_text() {
            let parts: Vec<String> = bincode::deserialize(&entry.blob)?;
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            codec.parse_array(path, &refs)
        } else {
            Err(tag_mismatch(path, entry, &expected))
        }
    }
}

impl CacheBackend for BinaryBackend {
    fn init_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.store = decode_container(bytes)?;
        Ok(())
    }
}

impl ConfigBackend for BinaryBackend {
    fn init_from_file(&mut self, path: &Path) -> bool {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read binary store {}: {}", path.display(), e);
                return false;
            }
        };

        match self.init_from_bytes(&bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Malformed binary store {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Binary stores have no text form
    fn init_from_str(&mut self, _text: &str) -> Result<()> {
        Err(PathKvError::NotSupported(
            "binary stores cannot be initialized from text".to_string(),
        ))
    }
}

// =============================================================================
// Container Framing
// =============================================================================

fn encode_container(store: &BTreeMap<String, Entry>) -> Result<Vec<u8>> {
    let payload = bincode::serialize(store)?;
    let crc = crc32fast::hash(&payload);

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_slice(MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u32_le(crc);
    buf.put_slice(&payload);

    Ok(buf.to_vec())
}

fn decode_container(bytes: &[u8]) -> Result<BTreeMap<String, Entry>> {
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }

    if bytes.len() < HEADER_SIZE {
        return Err(PathKvError::Initialization(format!(
            "Truncated container header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = bytes;
    if &buf[..4] != MAGIC {
        return Err(PathKvError::Initialization(format!(
            "Invalid container magic: expected PKVB, got {:?}",
            &buf[..4]
        )));
    }
    buf.advance(4);

    let version = buf.get_u16_le();
    if version != VERSION {
        return Err(PathKvError::Initialization(format!(
            "Unsupported container version: {}",
            version
        )));
    }

    let expected_crc = buf.get_u32_le();
    let actual_crc = crc32fast::hash(buf);
    if expected_crc != actual_crc {
        return Err(PathKvError::Initialization(format!(
            "Container checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    bincode::deserialize(buf)
        .map_err(|e| PathKvError::Initialization(format!("Undecodable container payload: {}", e)))
}
