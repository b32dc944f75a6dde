//! Immutable archive blobs
//!
//! An [`ArchiveBlob`] owns the raw bytes of one archive together with its
//! parsed directory. Every read clones the parsed directory handle, so each
//! extraction gets its own freshly positioned cursor and no read state is
//! shared between callers.

use crate::index::{ArchiveFormatError, ArchiveIndex};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from an entry's declared size
const INITIAL_READ_CAPACITY: u64 = 64 * 1024;

/// Errors raised while extracting a single entry
#[derive(Debug, Error)]
pub enum EntryError {
    /// The directory does not list the entry
    #[error("Entry not found: {0}")]
    Missing(String),

    /// The archive could not locate or decode the entry
    #[error("Corrupt entry '{name}': {source}")]
    Corrupt {
        /// Entry name
        name: String,
        /// Underlying archive error
        #[source]
        source: ZipError,
    },

    /// Decompression or checksum verification failed mid-read
    #[error("Failed to read entry '{name}': {source}")]
    Io {
        /// Entry name
        name: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The entry is larger than the configured limit
    #[error("Entry '{name}' is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Entry name
        name: String,
        /// Declared or observed uncompressed size
        size: u64,
        /// Configured limit
        limit: u64,
    },
}

/// One archive held in memory.
#[derive(Clone)]
pub struct ArchiveBlob {
    bytes: Arc<[u8]>,
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
    index: ArchiveIndex,
    digest: [u8; 32],
}

impl ArchiveBlob {
    /// Parse the directory of `bytes` and take ownership of them.
    ///
    /// # Returns
    /// * `Ok(ArchiveBlob)` - Archive parsed, directory indexed
    /// * `Err(ArchiveFormatError)` - The bytes are not a valid archive
    pub fn parse(bytes: impl Into<Arc<[u8]>>) -> Result<Self, ArchiveFormatError> {
        let bytes: Arc<[u8]> = bytes.into();
        let archive = ZipArchive::new(Cursor::new(Arc::clone(&bytes)))?;
        let index = ArchiveIndex::from_archive(&archive);
        let digest = Sha256::digest(&bytes).into();

        Ok(Self {
            bytes,
            archive,
            index,
            digest,
        })
    }

    /// Entry names listed in the directory
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Raw archive bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the archive in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the archive has no bytes (never true for a parsed archive)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the archive bytes
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// SHA-256 of the archive bytes, hex encoded
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Check whether the directory lists `name`
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    /// Decompress one entry into memory.
    ///
    /// # Arguments
    /// * `name` - Exact entry name
    /// * `limit` - Maximum uncompressed size accepted, if any
    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> Result<Vec<u8>, EntryError> {
        if !self.index.contains(name) {
            return Err(EntryError::Missing(name.to_owned()));
        }

        let mut archive = self.archive.clone();
        let mut file = archive.by_name(name).map_err(|source| EntryError::Corrupt {
            name: name.to_owned(),
            source,
        })?;

        let declared = file.size();
        let cap = limit.unwrap_or(u64::MAX);
        if declared > cap {
            return Err(EntryError::TooLarge {
                name: name.to_owned(),
                size: declared,
                limit: cap,
            });
        }

        let reserve = declared.min(INITIAL_READ_CAPACITY);
        let mut buffer = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
        (&mut file)
            .take(cap.saturating_add(1))
            .read_to_end(&mut buffer)
            .map_err(|source| EntryError::Io {
                name: name.to_owned(),
                source,
            })?;

        // The header size can lie; enforce the limit on what was actually inflated.
        let actual = buffer.len() as u64;
        if actual > cap {
            return Err(EntryError::TooLarge {
                name: name.to_owned(),
                size: actual,
                limit: cap,
            });
        }

        Ok(buffer)
    }

    /// Open an independent stream positioned at the start of one entry.
    pub fn open_entry(&self, name: &str, limit: Option<u64>) -> Result<EntryStream, EntryError> {
        let bytes = self.read_entry(name, limit)?;
        Ok(EntryStream::new(name.to_owned(), bytes))
    }
}

impl fmt::Debug for ArchiveBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveBlob")
            .field("len", &self.bytes.len())
            .field("entries", &self.index.len())
            .field("digest", &self.digest_hex())
            .finish()
    }
}

/// Readable stream over one extracted entry.
///
/// Every stream owns its own cursor; reading one never moves another.
#[derive(Debug, Clone)]
pub struct EntryStream {
    name: String,
    cursor: Cursor<Vec<u8>>,
}

impl EntryStream {
    fn new(name: String, bytes: Vec<u8>) -> Self {
        Self {
            name,
            cursor: Cursor::new(bytes),
        }
    }

    /// Entry name this stream reads from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total entry size in bytes
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Check if the entry is empty
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Consume the stream and return the whole entry, ignoring the position
    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for EntryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}
