//! unitpack archive layer
//!
//! This crate holds everything that touches archive bytes directly:
//! - Directory indexing of in-memory ZIP blobs
//! - Immutable archive blobs with on-demand entry extraction
//! - An ordered registry of archives with a derived entry-name index
//! - An in-memory archive writer used for slimmed bundles

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod blob;
pub mod index;
pub mod registry;
pub mod writer;

pub use blob::{ArchiveBlob, EntryError, EntryStream};
pub use index::{ArchiveFormatError, ArchiveIndex};
pub use registry::{ArchiveId, ArchiveRegistry, RegisteredArchive};
pub use writer::{ArchiveWriter, Compression, WriteError};
