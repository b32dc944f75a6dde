//! In-memory archive writer

use std::io::{self, Cursor, Write};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors that can occur while building an archive
#[derive(Debug, Error)]
pub enum WriteError {
    /// The archive rejected an entry header
    #[error("Failed to start entry '{name}': {source}")]
    Entry {
        /// Entry name
        name: String,
        /// Underlying archive error
        #[source]
        source: ZipError,
    },

    /// Writing entry data failed
    #[error("Failed to write entry data: {0}")]
    Io(#[from] io::Error),

    /// Writing the central directory failed
    #[error("Failed to finish archive: {0}")]
    Finish(#[source] ZipError),
}

/// Entry compression used by [`ArchiveWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression
    Stored,
    /// DEFLATE
    #[default]
    Deflated,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Builds a ZIP archive into a byte vector
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveWriter {
    /// Create an empty archive using `compression` for every entry
    pub fn new(compression: Compression) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(compression.method()),
            entries: 0,
        }
    }

    /// Append a file entry
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), WriteError> {
        self.zip
            .start_file(name, self.options)
            .map_err(|source| WriteError::Entry {
                name: name.to_owned(),
                source,
            })?;
        self.zip.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    /// Append a directory entry
    pub fn add_directory(&mut self, name: &str) -> Result<(), WriteError> {
        self.zip
            .add_directory(name, self.options)
            .map_err(|source| WriteError::Entry {
                name: name.to_owned(),
                source,
            })?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write the central directory and return the archive bytes
    pub fn finish(self) -> Result<Vec<u8>, WriteError> {
        let cursor = self.zip.finish().map_err(WriteError::Finish)?;
        Ok(cursor.into_inner())
    }
}
