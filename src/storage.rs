//! Storage Module
//!
//! The dispatch engine facade: typed and batch access over any [`Backend`].
//!
//! ## Responsibilities
//! - Forward typed `get`/`set` to the backend with the codec of `T`
//! - Resolve homogeneous and heterogeneous batches through the [`Dispatcher`]
//! - Decide scalar vs array arity for every typed call through the [`Dispatcher`]
//! - Surface `UnsupportedType` / `UnsupportedArrayRank` before touching the backend
//!
//! Batches are not atomic: an entry that fails leaves earlier entries applied.

use std::any::Any;
use std::sync::Arc;

use crate::backend::Backend;
use crate::capability::Capabilities;
use crate::dispatch::{Dispatcher, DynValue, TypeRegistry};
use crate::error::{PathKvError, Result};
use crate::observable::ChangeEvent;

/// Typed access to a backend
pub struct Storage<B: Backend> {
    /// The physical store
    backend: B,

    /// Per-instance setter cache
    dispatcher: Dispatcher,
}

impl<B: Backend + Default> Default for Storage<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: Backend> Storage<B> {
    /// Wrap a backend, resolving types against the global registry
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, TypeRegistry::global())
    }

    /// Wrap a backend, resolving types against `registry`
    pub fn with_registry(backend: B, registry: Arc<TypeRegistry>) -> Self {
        Self {
            backend,
            dispatcher: Dispatcher::new(registry),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Serialize the whole backend
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.backend.to_bytes()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn contains(&self, path: &str) -> bool {
        self.backend.contains(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.backend.paths()
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.backend.remove(path)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Read the string stored at `path`
    pub fn get_str(&self, path: &str) -> Result<String> {
        self.backend.get(path)
    }

    /// Read a typed value
    ///
    /// `T` may be `Vec<U>`, in which case the path is read as an array.
    pub fn get<T: Any>(&self, path: &str) -> Result<T> {
        let setter = self.dispatcher.resolve_for::<T>(path)?;
        downcast::<T>(setter.read(&self.backend, path)?)
    }

    /// Read a rank-1 array of `T`
    pub fn get_array<T: Any>(&self, path: &str) -> Result<Vec<T>> {
        let setter = self.dispatcher.resolve_for::<Vec<T>>(path)?;
        downcast::<Vec<T>>(setter.read(&self.backend, path)?)
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Store a string at `path`
    pub fn set_str(&mut self, path: &str, value: &str) -> Result<()> {
        self.backend.set(path, value)
    }

    /// Store a typed value
    ///
    /// `T` may be `Vec<U>`, in which case the value is stored as an array.
    pub fn set<T: Any>(&mut self, path: &str, value: T) -> Result<()> {
        self.apply(path, &value).map(|_| ())
    }

    /// Store a rank-1 array of `T`
    pub fn set_array<T: Any>(&mut self, path: &str, values: Vec<T>) -> Result<()> {
        self.apply_array(path, &values).map(|_| ())
    }

    /// Store a homogeneous batch
    ///
    /// `T` may itself be `Vec<U>`, in which case every entry is stored as an
    /// array. The setter for `T` is resolved once and cached.
    pub fn set_many<I, P, T>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: Any,
    {
        self.apply_many(values).map(|_| ())
    }

    /// Store a heterogeneous batch
    ///
    /// Each entry's setter is resolved from its runtime type (cached per type).
    pub fn set_many_dynamic<I, P>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, DynValue)>,
        P: AsRef<str>,
    {
        self.apply_many_dynamic(values).map(|_| ())
    }

    // =========================================================================
    // Internal (shared with the observable layer)
    // =========================================================================

    /// Typed set returning the stringified value
    pub(crate) fn apply<T: Any>(&mut self, path: &str, value: &T) -> Result<String> {
        let setter = self.dispatcher.resolve_for::<T>(path)?;
        setter.apply(&mut self.backend, path, value)?;
        Ok(setter.describe(value))
    }

    /// Array set returning the stringified value
    #[allow(clippy::ptr_arg)]
    pub(crate) fn apply_array<T: Any>(&mut self, path: &str, values: &Vec<T>) -> Result<String> {
        let setter = self.dispatcher.resolve_for::<Vec<T>>(path)?;
        setter.apply(&mut self.backend, path, values)?;
        Ok(setter.describe(values))
    }

    /// Apply a homogeneous batch, returning the event for its first entry
    pub(crate) fn apply_many<I, P, T>(&mut self, values: I) -> Result<Option<ChangeEvent>>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: Any,
    {
        let mut entries = values.into_iter().peekable();
        let setter = match entries.peek() {
            Some((path, _)) => self.dispatcher.resolve_for::<T>(path.as_ref())?,
            None => return Ok(None),
        };

        let mut first = None;
        for (path, value) in entries {
            let path = path.as_ref();
            setter.apply(&mut self.backend, path, &value)?;
            if first.is_none() {
                first = Some(ChangeEvent::new(path, setter.describe(&value)));
            }
        }
        Ok(first)
    }

    /// Apply a heterogeneous batch, returning the event for its first entry
    pub(crate) fn apply_many_dynamic<I, P>(&mut self, values: I) -> Result<Option<ChangeEvent>>
    where
        I: IntoIterator<Item = (P, DynValue)>,
        P: AsRef<str>,
    {
        let mut first = None;
        for (path, boxed) in values {
            let path = path.as_ref();
            let value: &dyn Any = &*boxed;

            let setter = self.dispatcher.resolve_dynamic(value, path)?;
            setter.apply(&mut self.backend, path, value)?;
            if first.is_none() {
                first = Some(ChangeEvent::new(path, setter.describe(value)));
            }
        }
        Ok(first)
    }
}

fn downcast<T: Any>(value: Box<dyn Any>) -> Result<T> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| PathKvError::unsupported::<T>("backend returned a value of another type"))
}
