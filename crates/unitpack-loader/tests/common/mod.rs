//! Shared fixtures for loader integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use unitpack_archive::{ArchiveWriter, Compression};
use unitpack_loader::{DefineError, UnitDefiner, UnitImage};

/// Build a deflated archive from `(entry name, bytes)` pairs
pub fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build(entries, Compression::Deflated)
}

/// Build an uncompressed archive, so entry bytes appear verbatim in the blob
pub fn stored_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build(entries, Compression::Stored)
}

fn build(entries: &[(&str, &[u8])], compression: Compression) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(compression);
    for (name, bytes) in entries {
        writer.add_entry(name, bytes).unwrap();
    }
    writer.finish().unwrap()
}

/// Flip the first byte of `payload` inside a stored archive.
///
/// The directory stays intact, so the entry is still listed, but reading it
/// fails the CRC check.
pub fn corrupt(mut blob: Vec<u8>, payload: &[u8]) -> Vec<u8> {
    let at = blob
        .windows(payload.len())
        .position(|w| w == payload)
        .expect("payload not found in archive");
    blob[at] ^= 0xFF;
    blob
}

/// Definer that counts how often it is called
#[derive(Debug, Clone, Default)]
pub struct CountingDefiner {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingDefiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every define, widening race windows
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: Arc::default(),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UnitDefiner for CountingDefiner {
    type Definition = UnitImage;

    fn define(&self, name: &str, bytes: &[u8]) -> Result<UnitImage, DefineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(UnitImage::new(name, bytes))
    }
}
