//! Observable Module
//!
//! Change notification on top of the dispatch engine.
//!
//! ## Delivery
//! - Observers run synchronously, in registration order, on the thread making
//!   the mutating call, after the backend write succeeded
//! - Each observer also receives the backend, so a persistence hook can
//!   serialize the whole store
//! - An observer error is returned to the caller; the write is kept and the
//!   remaining observers are skipped
//!
//! ## Batches
//! `set_many` and `set_many_dynamic` notify once, for the first entry only.
//! Empty batches notify nothing.
//!
//! ## Concurrency
//! Single writer: every mutation and (un)subscription takes `&mut self`.
//! `ObservableStorage` is `Send`; wrap it in a `Mutex` to share it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::capability::Capabilities;
use crate::dispatch::{Dispatcher, DynValue, TypeRegistry};
use crate::error::Result;
use crate::storage::Storage;

/// A mutation that has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path that changed
    pub path: String,

    /// Stringified new value
    pub value: String,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Handle returned by [`ObserverList::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked after each applied mutation
pub type Observer = Box<dyn FnMut(&ChangeEvent, &dyn Backend) -> Result<()> + Send>;

/// Ordered list of observers
#[derive(Default)]
pub struct ObserverList {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent, &dyn Backend) -> Result<()> + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer, returning whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Invoke every observer in order, stopping at the first error
    pub fn notify(&mut self, event: &ChangeEvent, backend: &dyn Backend) -> Result<()> {
        for (id, observer) in self.observers.iter_mut() {
            if let Err(e) = observer(event, backend) {
                tracing::warn!("Observer {:?} failed for '{}': {}", id, event.path, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// [`Storage`] that raises a [`ChangeEvent`] after every successful mutation
pub struct ObservableStorage<B: Backend> {
    storage: Storage<B>,
    observers: ObserverList,
}

impl<B: Backend + Default> Default for ObservableStorage<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: Backend> ObservableStorage<B> {
    /// Wrap a backend, resolving types against the global registry
    pub fn new(backend: B) -> Self {
        Self::from_storage(Storage::new(backend))
    }

    /// Wrap a backend, resolving types against `registry`
    pub fn with_registry(backend: B, registry: Arc<TypeRegistry>) -> Self {
        Self::from_storage(Storage::with_registry(backend, registry))
    }

    pub fn from_storage(storage: Storage<B>) -> Self {
        Self {
            storage,
            observers: ObserverList::new(),
        }
    }

    /// Builder-style subscription at construction
    pub fn observed_by<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ChangeEvent, &dyn Backend) -> Result<()> + Send + 'static,
    {
        self.observers.subscribe(observer);
        self
    }

    // =========================================================================
    // Observers
    // =========================================================================

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent, &dyn Backend) -> Result<()> + Send + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, event: ChangeEvent) -> Result<()> {
        self.observers.notify(&event, self.storage.backend())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }

    pub fn backend(&self) -> &B {
        self.storage.backend()
    }

    /// Mutable backend access; changes made through it are not observed
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        self.storage.backend_mut()
    }

    pub fn into_storage(self) -> Storage<B> {
        self.storage
    }

    pub fn capabilities(&self) -> Capabilities {
        self.storage.capabilities()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.storage.to_bytes()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.storage.dispatcher()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.storage.contains(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.storage.paths()
    }

    /// Drop a key; not observed
    pub fn remove(&mut self, path: &str) -> bool {
        self.storage.remove(path)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn get_str(&self, path: &str) -> Result<String> {
        self.storage.get_str(path)
    }

    pub fn get<T: Any>(&self, path: &str) -> Result<T> {
        self.storage.get(path)
    }

    pub fn get_array<T: Any>(&self, path: &str) -> Result<Vec<T>> {
        self.storage.get_array(path)
    }

    // =========================================================================
    // Setters
    // =========================================================================

    pub fn set_str(&mut self, path: &str, value: &str) -> Result<()> {
        self.storage.set_str(path, value)?;
        self.notify(ChangeEvent::new(path, value))
    }

    pub fn set<T: Any>(&mut self, path: &str, value: T) -> Result<()> {
        let text = self.storage.apply(path, &value)?;
        self.notify(ChangeEvent::new(path, text))
    }

    /// Notifies with the elements joined by `,`
    pub fn set_array<T: Any>(&mut self, path: &str, values: Vec<T>) -> Result<()> {
        let text = self.storage.apply_array(path, &values)?;
        self.notify(ChangeEvent::new(path, text))
    }

    /// Homogeneous batch; notifies once, for the first entry
    pub fn set_many<I, P, T>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: Any,
    {
        match self.storage.apply_many(values)? {
            Some(first) => self.notify(first),
            None => Ok(()),
        }
    }

    /// Heterogeneous batch; notifies once, for the first entry
    pub fn set_many_dynamic<I, P>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, DynValue)>,
        P: AsRef<str>,
    {
        match self.storage.apply_many_dynamic(values)? {
            Some(first) => self.notify(first),
            None => Ok(()),
        }
    }
}
