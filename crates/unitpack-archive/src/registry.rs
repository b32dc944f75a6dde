//! Archive registry
//!
//! The registry keeps archives in registration order and maintains a derived
//! index from entry name to the archives that list it, so containment checks
//! do not scan every archive's directory. Overlapping names are allowed; the
//! index keeps every owner in registration order and lookups favour the
//! earliest one.

use crate::blob::{ArchiveBlob, EntryError, EntryStream};
use crate::index::ArchiveIndex;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Registration ordinal of an archive within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(usize);

impl ArchiveId {
    /// Position of the archive in registration order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive#{}", self.0)
    }
}

/// An archive that has been accepted by a registry
#[derive(Debug)]
pub struct RegisteredArchive {
    id: ArchiveId,
    blob: ArchiveBlob,
}

impl RegisteredArchive {
    /// Registration ordinal
    pub fn id(&self) -> ArchiveId {
        self.id
    }

    /// Underlying archive blob
    pub fn blob(&self) -> &ArchiveBlob {
        &self.blob
    }

    /// Entry names listed by this archive
    pub fn index(&self) -> &ArchiveIndex {
        self.blob.index()
    }

    /// Check whether this archive lists `name`
    pub fn contains(&self, name: &str) -> bool {
        self.blob.contains(name)
    }

    /// Decompress one entry into memory
    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> Result<Vec<u8>, EntryError> {
        self.blob.read_entry(name, limit)
    }

    /// Open an independent stream over one entry
    pub fn open_entry(&self, name: &str, limit: Option<u64>) -> Result<EntryStream, EntryError> {
        self.blob.open_entry(name, limit)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    archives: Vec<Arc<RegisteredArchive>>,
    /// Entry name -> archives listing it, in registration order
    by_entry: FxHashMap<String, Vec<ArchiveId>>,
}

/// Ordered, thread-safe collection of archives
#[derive(Debug, Default)]
pub struct ArchiveRegistry {
    state: RwLock<RegistryState>,
}

impl ArchiveRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an archive and extend the derived index
    ///
    /// The archive list and index are updated under one write lock, so a
    /// reader never sees an index entry for an archive that is not yet listed.
    pub fn register(&self, blob: ArchiveBlob) -> ArchiveId {
        let mut state = self.state.write();
        let id = ArchiveId(state.archives.len());

        for name in blob.index().iter() {
            state.by_entry.entry(name.to_owned()).or_default().push(id);
        }

        tracing::debug!(
            archive = %id,
            entries = blob.index().len(),
            bytes = blob.len(),
            digest = %blob.digest_hex(),
            "archive registered"
        );

        state.archives.push(Arc::new(RegisteredArchive { id, blob }));
        id
    }

    /// Check whether any registered archive lists `name`
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().by_entry.contains_key(name)
    }

    /// Archives listing `name`, earliest registration first
    pub fn candidates(&self, name: &str) -> Vec<Arc<RegisteredArchive>> {
        let state = self.state.read();
        match state.by_entry.get(name) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| state.archives.get(id.0).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Look up an archive by id
    pub fn get(&self, id: ArchiveId) -> Option<Arc<RegisteredArchive>> {
        self.state.read().archives.get(id.0).cloned()
    }

    /// Ids of every registered archive, in registration order
    pub fn ids(&self) -> Vec<ArchiveId> {
        self.state.read().archives.iter().map(|a| a.id).collect()
    }

    /// Every registered archive, in registration order
    pub fn archives(&self) -> Vec<Arc<RegisteredArchive>> {
        self.state.read().archives.clone()
    }

    /// Every distinct entry name across all archives, sorted
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().by_entry.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered archives
    pub fn len(&self) -> usize {
        self.state.read().archives.len()
    }

    /// Check if no archive has been registered
    pub fn is_empty(&self) -> bool {
        self.state.read().archives.is_empty()
    }
}
