//! Dispatch Module
//!
//! Runtime type dispatch for typed and heterogeneous access.
//!
//! ## Responsibilities
//! - Hold one [`TypeCodec`] per registered element type (text and/or binary contract)
//! - Record the shape of `T`, `Vec<T>` and `Vec<Vec<T>>` so a value's arity can be
//!   recovered from its `TypeId` alone
//! - Resolve a concrete type to a [`BoundSetter`] once per [`Dispatcher`] and reuse it
//!
//! ## Resolution
//! ```text
//!   TypeId ──► setter cache ──hit──► BoundSetter
//!                  │
//!                 miss
//!                  ▼
//!              shape table ──rank 0──► Scalar(codec)
//!                  │        ──rank 1──► Array(codec)
//!                  │        ──rank 2──► UnsupportedArrayRank
//!                  ▼
//!            UnsupportedType
//! ```
//!
//! Codecs are captured into the cache at first resolution, so register every
//! type (and every contract upgrade) before the first batch that uses it.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::Backend;
use crate::error::{PathKvError, Result};
use crate::value::ParsableFromString;

/// A value whose concrete type is only known at runtime
pub type DynValue = Box<dyn Any + Send + Sync>;

/// Box a value for a heterogeneous batch
pub fn dynamic<T: Any + Send + Sync>(value: T) -> DynValue {
    Box::new(value)
}

// =============================================================================
// Contracts
// =============================================================================

type ParseFn = fn(&str) -> std::result::Result<Box<dyn Any>, String>;
type ParseArrayFn = fn(&[&str]) -> std::result::Result<Box<dyn Any>, String>;
type DecodeFn = fn(&[u8]) -> bincode::Result<Box<dyn Any>>;
type EncodeFn = fn(&dyn Any) -> Option<bincode::Result<Vec<u8>>>;
type RenderFn = fn(&dyn Any) -> Option<String>;

/// String contract: `Display` out, `parse_invariant` in
#[derive(Clone, Copy)]
struct TextContract {
    render: RenderFn,
    parse: ParseFn,
    render_array: fn(&dyn Any) -> Option<Vec<String>>,
    parse_array: ParseArrayFn,
}

impl TextContract {
    fn of<T: ParsableFromString + 'static>() -> Self {
        Self {
            render: render_scalar::<T>,
            parse: parse_scalar::<T>,
            render_array: render_array::<T>,
            parse_array: parse_array::<T>,
        }
    }
}

/// Binary contract: bincode through serde
#[derive(Clone, Copy)]
struct BinaryContract {
    encode: EncodeFn,
    decode: DecodeFn,
    encode_array: EncodeFn,
    decode_array: DecodeFn,
    debug: Option<(RenderFn, RenderFn)>,
}

impl BinaryContract {
    fn of<T: Serialize + DeserializeOwned + 'static>() -> Self {
        Self {
            encode: encode_as::<T>,
            decode: decode_as::<T>,
            encode_array: encode_as::<Vec<T>>,
            decode_array: decode_as::<Vec<T>>,
            debug: None,
        }
    }

    fn with_debug<T: Serialize + DeserializeOwned + Debug + 'static>() -> Self {
        Self {
            debug: Some((debug_scalar::<T>, debug_array::<T>)),
            ..Self::of::<T>()
        }
    }
}

fn render_scalar<T: ParsableFromString + 'static>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(ToString::to_string)
}

fn parse_scalar<T: ParsableFromString + 'static>(
    text: &str,
) -> std::result::Result<Box<dyn Any>, String> {
    T::parse_invariant(text).map(|v| Box::new(v) as Box<dyn Any>)
}

fn render_array<T: ParsableFromString + 'static>(value: &dyn Any) -> Option<Vec<String>> {
    value
        .downcast_ref::<Vec<T>>()
        .map(|items| items.iter().map(ToString::to_string).collect())
}

fn parse_array<T: ParsableFromString + 'static>(
    parts: &[&str],
) -> std::result::Result<Box<dyn Any>, String> {
    parts
        .iter()
        .map(|part| T::parse_invariant(part))
        .collect::<std::result::Result<Vec<T>, String>>()
        .map(|items| Box::new(items) as Box<dyn Any>)
}

fn encode_as<T: Serialize + 'static>(value: &dyn Any) -> Option<bincode::Result<Vec<u8>>> {
    value.downcast_ref::<T>().map(bincode::serialize)
}

fn decode_as<T: DeserializeOwned + 'static>(bytes: &[u8]) -> bincode::Result<Box<dyn Any>> {
    bincode::deserialize::<T>(bytes).map(|v| Box::new(v) as Box<dyn Any>)
}

fn debug_scalar<T: Debug + 'static>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(|v| format!("{:?}", v))
}

fn debug_array<T: Debug + 'static>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<Vec<T>>().map(|items| {
        items
            .iter()
            .map(|v| format!("{:?}", v))
            .collect::<Vec<_>>()
            .join(",")
    })
}

// =============================================================================
// TypeCodec
// =============================================================================

/// Type-erased handlers for one element type `T` (scalars and `Vec<T>`)
///
/// Backends receive a codec alongside a `&dyn Any` and pick whichever
/// contract matches their representation.
#[derive(Clone)]
pub struct TypeCodec {
    type_name: &'static str,
    text: Option<TextContract>,
    binary: Option<BinaryContract>,
}

impl Debug for TypeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCodec")
            .field("type_name", &self.type_name)
            .field("text", &self.text.is_some())
            .field("binary", &self.binary.is_some())
            .finish()
    }
}

impl TypeCodec {
    /// Name of the element type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the type offers the string parse contract
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Whether the type offers a serde contract
    pub fn has_binary(&self) -> bool {
        self.binary.is_some()
    }

    /// Fail with `UnsupportedType` unless the string contract is present
    pub fn require_text(&self) -> Result<()> {
        self.text_contract().map(|_| ())
    }

    fn text_contract(&self) -> Result<&TextContract> {
        self.text.as_ref().ok_or_else(|| PathKvError::UnsupportedType {
            type_name: self.type_name.to_string(),
            reason: "type offers no string parse contract",
        })
    }

    fn mismatch(&self) -> PathKvError {
        PathKvError::UnsupportedType {
            type_name: self.type_name.to_string(),
            reason: "value does not match the codec's type",
        }
    }

    // -------------------------------------------------------------------------
    // Text
    // -------------------------------------------------------------------------

    /// Render a scalar with invariant formatting
    pub fn to_text(&self, value: &dyn Any) -> Result<String> {
        let contract = self.text_contract()?;
        (contract.render)(value).ok_or_else(|| self.mismatch())
    }

    /// Parse a scalar from its invariant text
    pub fn parse(&self, path: &str, text: &str) -> Result<Box<dyn Any>> {
        let contract = self.text_contract()?;
        (contract.parse)(text).map_err(|message| PathKvError::Parse {
            path: path.to_string(),
            message,
        })
    }

    /// Render each element of a `Vec<T>`
    pub fn array_to_text(&self, items: &dyn Any) -> Result<Vec<String>> {
        let contract = self.text_contract()?;
        (contract.render_array)(items).ok_or_else(|| self.mismatch())
    }

    /// Parse each element into a `Vec<T>`
    pub fn parse_array(&self, path: &str, parts: &[&str]) -> Result<Box<dyn Any>> {
        let contract = self.text_contract()?;
        (contract.parse_array)(parts).map_err(|message| PathKvError::Parse {
            path: path.to_string(),
            message,
        })
    }

    // -------------------------------------------------------------------------
    // Binary (falls back to the invariant text when no serde contract exists)
    // -------------------------------------------------------------------------

    /// Serialize a scalar to bytes
    pub fn encode(&self, value: &dyn Any) -> Result<Vec<u8>> {
        if let Some(binary) = &self.binary {
            let encoded = (binary.encode)(value).ok_or_else(|| self.mismatch())?;
            return Ok(encoded?);
        }

        let text = self.to_text(value)?;
        Ok(bincode::serialize(&text)?)
    }

    /// Deserialize a scalar from bytes
    pub fn decode(&self, path: &str, bytes: &[u8]) -> Result<Box<dyn Any>> {
        if let Some(binary) = &self.binary {
            return Ok((binary.decode)(bytes)?);
        }

        let text: String = bincode::deserialize(bytes)?;
        self.parse(path, &text)
    }

    /// Serialize a `Vec<T>` to bytes
    pub fn encode_array(&self, items: &dyn Any) -> Result<Vec<u8>> {
        if let Some(binary) = &self.binary {
            let encoded = (binary.encode_array)(items).ok_or_else(|| self.mismatch())?;
            return Ok(encoded?);
        }

        let parts = self.array_to_text(items)?;
        Ok(bincode::serialize(&parts)?)
    }

    /// Deserialize a `Vec<T>` from bytes
    pub fn decode_array(&self, path: &str, bytes: &[u8]) -> Result<Box<dyn Any>> {
        if let Some(binary) = &self.binary {
            return Ok((binary.decode_array)(bytes)?);
        }

        let parts: Vec<String> = bincode::deserialize(bytes)?;
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        self.parse_array(path, &refs)
    }

    // -------------------------------------------------------------------------
    // Notification text
    // -------------------------------------------------------------------------

    /// Stringified scalar for change notifications
    pub fn describe(&self, value: &dyn Any) -> String {
        if let Some(text) = self.text.as_ref().and_then(|c| (c.render)(value)) {
            return text;
        }
        if let Some((debug, _)) = self.binary.and_then(|c| c.debug) {
            if let Some(text) = debug(value) {
                return text;
            }
        }
        self.type_name.to_string()
    }

    /// Stringified array (elements joined with `,`) for change notifications
    pub fn describe_array(&self, items: &dyn Any) -> String {
        if let Some(parts) = self.text.as_ref().and_then(|c| (c.render_array)(items)) {
            return parts.join(",");
        }
        if let Some((_, debug)) = self.binary.and_then(|c| c.debug) {
            if let Some(text) = debug(items) {
                return text;
            }
        }
        format!("{}[]", self.type_name)
    }
}

// =============================================================================
// TypeRegistry
// =============================================================================

/// Arity of a registered concrete type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shape {
    rank: usize,
    element: TypeId,
}

/// Process-wide table of codecs and shapes, keyed by `TypeId`
pub struct TypeRegistry {
    /// Element type → codec
    codecs: RwLock<HashMap<TypeId, Arc<TypeCodec>>>,

    /// Concrete type (`T`, `Vec<T>`, `Vec<Vec<T>>`) → shape
    shapes: RwLock<HashMap<TypeId, Shape>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Registry with nothing registered
    pub fn empty() -> Self {
        Self {
            codecs: RwLock::new(HashMap::new()),
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with all primitive types pre-registered
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_primitives();
        registry
    }

    /// The shared registry used by storages that were not given their own
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TypeRegistry::new())))
    }

    fn register_primitives(&self) {
        macro_rules! register_all {
            ($($ty:ty),*) => { $( self.register::<$ty>(); )* };
        }
        register_all!(
            bool, char, String, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
            f32, f64
        );
    }

    /// Register `T` with both the string and the serde contract
    pub fn register<T>(&self)
    where
        T: ParsableFromString + Serialize + DeserializeOwned + 'static,
    {
        self.install::<T>(Some(TextContract::of::<T>()), Some(BinaryContract::of::<T>()));
    }

    /// Register `T` with the string contract only
    ///
    /// Binary backends store such values as their invariant text.
    pub fn register_parsable<T: ParsableFromString + 'static>(&self) {
        self.install::<T>(Some(TextContract::of::<T>()), None);
    }

    /// Register `T` with the serde contract only
    ///
    /// Text backends reject such values with `UnsupportedType`.
    pub fn register_serde<T>(&self)
    where
        T: Serialize + DeserializeOwned + Debug + 'static,
    {
        self.install::<T>(None, Some(BinaryContract::with_debug::<T>()));
    }

    fn install<T: 'static>(&self, text: Option<TextContract>, binary: Option<BinaryContract>) {
        let element = TypeId::of::<T>();

        {
            let mut codecs = self.codecs.write();
            let merged = match codecs.get(&element) {
                Some(existing) => TypeCodec {
                    type_name: existing.type_name,
                    text: text.or(existing.text),
                    binary: binary.or(existing.binary),
                },
                None => TypeCodec {
                    type_name: type_name::<T>(),
                    text,
                    binary,
                },
            };
            codecs.insert(element, Arc::new(merged));
        }

        let mut shapes = self.shapes.write();
        shapes.insert(element, Shape { rank: 0, element });
        shapes.insert(TypeId::of::<Vec<T>>(), Shape { rank: 1, element });
        shapes.insert(TypeId::of::<Vec<Vec<T>>>(), Shape { rank: 2, element });
    }

    /// Codec for element type `T`
    pub fn codec<T: 'static>(&self) -> Result<Arc<TypeCodec>> {
        self.codecs
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| PathKvError::unsupported::<T>("type is not registered"))
    }

    /// Whether `T` has been registered as an element type
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.codecs.read().contains_key(&TypeId::of::<T>())
    }

    fn shape(&self, id: TypeId) -> Option<Shape> {
        self.shapes.read().get(&id).copied()
    }

    fn codec_by_id(&self, id: TypeId) -> Option<Arc<TypeCodec>> {
        self.codecs.read().get(&id).cloned()
    }
}

/// Register `T` in the global registry (string + serde contracts)
pub fn register<T>()
where
    T: ParsableFromString + Serialize + DeserializeOwned + 'static,
{
    TypeRegistry::global().register::<T>();
}

/// Register `T` in the global registry (string contract only)
pub fn register_parsable<T: ParsableFromString + 'static>() {
    TypeRegistry::global().register_parsable::<T>();
}

/// Register `T` in the global registry (serde contract only)
pub fn register_serde<T>()
where
    T: Serialize + DeserializeOwned + Debug + 'static,
{
    TypeRegistry::global().register_serde::<T>();
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Whether a resolved type is stored as a scalar or a rank-1 array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Scalar,
    Array,
}

/// A setter specialised for one concrete type
#[derive(Debug, Clone)]
pub struct BoundSetter {
    arity: Arity,
    codec: Arc<TypeCodec>,
}

impl BoundSetter {
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn codec(&self) -> &TypeCodec {
        &self.codec
    }

    /// Write `value` to `backend` through the scalar or array setter
    pub fn apply(&self, backend: &mut dyn Backend, path: &str, value: &dyn Any) -> Result<()> {
        match self.arity {
            Arity::Scalar => backend.set_value(path, value, &self.codec),
            Arity::Array => backend.set_array(path, value, &self.codec),
        }
    }

    /// Read the value at `path` through the scalar or array getter
    pub fn read(&self, backend: &dyn Backend, path: &str) -> Result<Box<dyn Any>> {
        match self.arity {
            Arity::Scalar => backend.get_value(path, &self.codec),
            Arity::Array => backend.get_array(path, &self.codec),
        }
    }

    /// Stringified value for change notifications
    pub fn describe(&self, value: &dyn Any) -> String {
        match self.arity {
            Arity::Scalar => self.codec.describe(value),
            Arity::Array => self.codec.describe_array(value),
        }
    }
}

/// Resolves concrete types to bound setters, memoized per `TypeId`
///
/// ## Concurrency:
/// - `setters`: RwLock (lookups share, first resolution of a type writes)
/// - `resolutions`: atomic counter of cache misses that bound a setter
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
    setters: RwLock<HashMap<TypeId, BoundSetter>>,
    resolutions: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            setters: RwLock::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Registry this dispatcher resolves against
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Resolve a statically known type
    pub fn resolve_for<T: 'static>(&self, path: &str) -> Result<BoundSetter> {
        self.resolve(TypeId::of::<T>(), type_name::<T>(), path)
    }

    /// Resolve the runtime type behind a dynamic value
    ///
    /// The concrete type name is not recoverable from `dyn Any`; unregistered
    /// values are reported by `TypeId`. String slices are never registered,
    /// box them as `String`.
    pub fn resolve_dynamic(&self, value: &dyn Any, path: &str) -> Result<BoundSetter> {
        let id = value.type_id();
        if let Some(setter) = self.cached(id) {
            return Ok(setter);
        }

        if value.is::<&'static str>() {
            return Err(PathKvError::UnsupportedType {
                type_name: format!("&str at '{}'", path),
                reason: "string slices are not stored, box the value as String",
            });
        }

        self.resolve(id, &format!("{:?}", id), path)
    }

    fn cached(&self, id: TypeId) -> Option<BoundSetter> {
        self.setters.read().get(&id).cloned()
    }

    fn resolve(&self, id: TypeId, type_name: &str, path: &str) -> Result<BoundSetter> {
        if let Some(setter) = self.cached(id) {
            return Ok(setter);
        }

        let setter = self.bind(id, type_name, path)?;
        tracing::trace!(
            "Bound {:?} setter for {} ({})",
            setter.arity,
            setter.codec.type_name(),
            type_name
        );

        self.setters.write().insert(id, setter.clone());
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        Ok(setter)
    }

    fn bind(&self, id: TypeId, type_name: &str, path: &str) -> Result<BoundSetter> {
        let unsupported = || PathKvError::UnsupportedType {
            type_name: format!("{} at '{}'", type_name, path),
            reason: "type is not registered",
        };

        let shape = self.registry.shape(id).ok_or_else(unsupported)?;
        let arity = match shape.rank {
            0 => Arity::Scalar,
            1 => Arity::Array,
            rank => {
                return Err(PathKvError::UnsupportedArrayRank {
                    path: path.to_string(),
                    rank,
                })
            }
        };

        let codec = self.registry.codec_by_id(shape.element).ok_or_else(unsupported)?;
        Ok(BoundSetter { arity, codec })
    }

    /// Number of concrete types with a cached setter
    pub fn cached_setters(&self) -> usize {
        self.setters.read().len()
    }

    /// Number of cache misses that produced a setter
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }
}
