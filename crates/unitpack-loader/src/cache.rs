//! Per-loader caches
//!
//! - [`DefinitionCache`]: define-once map from unit name to definition
//! - [`ExtractedBytes`]: append-only record of the bytes each unit was defined from

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Point-in-time copy of the extracted bytes, keyed by unit name
pub type ExtractedSnapshot = BTreeMap<String, Arc<[u8]>>;

/// Compute-if-absent cache of unit definitions.
///
/// Each name gets its own initialisation slot. Callers racing on one name
/// block on that slot only and all receive the single value it produces;
/// callers on other names never wait for it. A failed initialisation drops
/// its slot once no other caller is waiting on it, so misses leave nothing
/// behind and the next caller simply tries again.
pub struct DefinitionCache<T> {
    /// Completed definitions, never replaced or removed
    ready: DashMap<String, Arc<T>>,
    /// In-flight initialisations
    slots: DashMap<String, Arc<OnceCell<Arc<T>>>>,
}

impl<T> DefinitionCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            ready: DashMap::new(),
            slots: DashMap::new(),
        }
    }

    /// Get a completed definition
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.ready.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the definition for `name`, running `init` if there is none yet.
    ///
    /// `init` runs at most once per successful definition, without any map
    /// shard locked. Its error is returned as-is and nothing is cached.
    pub fn get_or_try_insert<E, F>(&self, name: &str, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        if let Some(hit) = self.get(name) {
            return Ok(hit);
        }

        let slot = Arc::clone(&*self.slots.entry(name.to_owned()).or_default());

        // A racing caller may have finished and retired its slot between the
        // first lookup and fetching ours.
        if let Some(hit) = self.get(name) {
            self.retire_unshared(name, &slot);
            return Ok(hit);
        }

        let value = match slot.get_or_try_init(init) {
            Ok(value) => Arc::clone(value),
            Err(error) => {
                self.retire_unshared(name, &slot);
                return Err(error);
            }
        };
        let value = Arc::clone(&*self.ready.entry(name.to_owned()).or_insert(value));
        self.slots
            .remove_if(name, |_, current| Arc::ptr_eq(current, &slot));
        Ok(value)
    }

    /// Drop `slot` from the map unless another caller still holds it.
    ///
    /// The shard lock keeps new callers from cloning the slot meanwhile; the
    /// map and the calling frame account for two references.
    fn retire_unshared(&self, name: &str, slot: &Arc<OnceCell<Arc<T>>>) {
        self.slots.remove_if(name, |_, current| {
            Arc::ptr_eq(current, slot) && Arc::strong_count(current) == 2
        });
    }

    /// Check whether `name` has a completed definition
    pub fn contains(&self, name: &str) -> bool {
        self.ready.contains_key(name)
    }

    /// Number of completed definitions
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    /// Check if nothing has been defined
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Number of initialisation slots still held
    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    /// Names with completed definitions, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ready.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }
}

impl<T> Default for DefinitionCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DefinitionCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionCache")
            .field("ready", &self.ready.len())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Append-only record of the bytes each unit was defined from
#[derive(Debug, Default)]
pub struct ExtractedBytes {
    entries: RwLock<ExtractedSnapshot>,
}

impl ExtractedBytes {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the bytes `name` was defined from; an existing record is kept
    pub fn record(&self, name: &str, bytes: Arc<[u8]>) {
        self.entries
            .write()
            .entry(name.to_owned())
            .or_insert(bytes);
    }

    /// Bytes recorded for `name`
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries.read().get(name).cloned()
    }

    /// Consistent copy of everything recorded so far
    pub fn snapshot(&self) -> ExtractedSnapshot {
        self.entries.read().clone()
    }

    /// Number of recorded units
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
