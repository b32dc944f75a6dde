//! Load events
//!
//! Loaders report what they do through `tracing` and, when one is installed,
//! through an [`EventHook`]. The hook is called synchronously on the thread
//! doing the work, so it should be cheap.

use std::sync::Arc;
use unitpack_archive::{ArchiveId, EntryError};

/// Callback receiving every [`LoadEvent`]
pub type EventHook = Arc<dyn Fn(&LoadEvent<'_>) + Send + Sync>;

/// Where a defined unit's bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    /// A registered archive
    Archive(ArchiveId),
    /// A package mapping
    Package,
}

/// Something a loader did
#[derive(Debug)]
pub enum LoadEvent<'a> {
    /// An archive was accepted
    ArchiveRegistered {
        /// New archive id
        archive: ArchiveId,
        /// Entries in its directory
        entries: usize,
    },
    /// A unit was defined from bytes
    UnitDefined {
        /// Unit name
        unit: &'a str,
        /// Origin of the bytes
        source: UnitSource,
        /// Size of the bytes
        size: usize,
    },
    /// The delegate supplied a unit
    UnitDelegated {
        /// Unit name
        unit: &'a str,
    },
    /// No registered archive lists the unit
    UnitMissing {
        /// Unit name
        unit: &'a str,
        /// Entry path that was looked up
        path: &'a str,
    },
    /// An archive lists an entry but could not read it
    EntryUnreadable {
        /// Entry name
        entry: &'a str,
        /// Archive that failed
        archive: ArchiveId,
        /// Failure
        error: &'a EntryError,
    },
}
