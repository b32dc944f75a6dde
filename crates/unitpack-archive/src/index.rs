//! Archive directory indexing
//!
//! Reads only the central directory of a ZIP blob; no entry is decompressed.

use rustc_hash::FxHashSet;
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// The bytes handed to the indexer are not a readable archive
#[derive(Debug, Error)]
#[error("Malformed archive: {0}")]
pub struct ArchiveFormatError(#[from] pub ZipError);

/// Immutable set of entry names listed in one archive's directory.
///
/// Names are stored exactly as the archive spells them, with the archive's
/// own `/` separator. Directory entries and non-unit resources are included.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    names: Arc<FxHashSet<String>>,
}

impl ArchiveIndex {
    /// Scan the directory of `bytes` and collect every entry name.
    ///
    /// # Returns
    /// * `Ok(ArchiveIndex)` - Names found in the directory
    /// * `Err(ArchiveFormatError)` - The bytes are not a valid archive
    pub fn scan(bytes: &[u8]) -> Result<Self, ArchiveFormatError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self::from_archive(&archive))
    }

    pub(crate) fn from_archive<R: Read + Seek>(archive: &ZipArchive<R>) -> Self {
        let names = archive.file_names().map(str::to_owned).collect();
        Self {
            names: Arc::new(names),
        }
    }

    /// Check whether the directory lists `name`
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of entries in the directory
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the directory is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over entry names in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
