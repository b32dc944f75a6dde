//! Turning unit bytes into definitions
//!
//! The loaders never interpret unit bytes themselves; a [`UnitDefiner`] does.
//! Hosts plug in their own definer to produce whatever executable form they
//! need. [`ImageDefiner`] is the default and keeps the bytes as an immutable,
//! checksummed [`UnitImage`].

use crate::error::DefineError;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Produces a definition from the raw bytes of one unit.
///
/// A definer is called at most once per unit name per loader. It must not ask
/// the same loader for the unit it is currently defining.
pub trait UnitDefiner: Send + Sync {
    /// Loaded form of a unit
    type Definition: Send + Sync;

    /// Define unit `name` from `bytes`
    fn define(&self, name: &str, bytes: &[u8]) -> Result<Self::Definition, DefineError>;
}

/// Immutable in-memory image of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitImage {
    name: String,
    bytes: Arc<[u8]>,
    checksum: [u8; 32],
}

impl UnitImage {
    /// Build an image, computing its SHA-256
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let checksum = Sha256::digest(&bytes).into();
        Self {
            name: name.into(),
            bytes,
            checksum,
        }
    }

    /// Unit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// SHA-256 of the unit bytes
    pub fn checksum(&self) -> &[u8; 32] {
        &self.checksum
    }

    /// SHA-256 of the unit bytes, hex encoded
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

/// Default definer producing [`UnitImage`]s.
///
/// Rejects empty units and, when a header is configured, units that do not
/// start with it.
#[derive(Debug, Clone, Default)]
pub struct ImageDefiner {
    magic: Option<Vec<u8>>,
}

impl ImageDefiner {
    /// Create a definer that accepts any non-empty unit
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every unit to start with `magic`
    pub fn with_magic(magic: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: Some(magic.into()),
        }
    }
}

impl UnitDefiner for ImageDefiner {
    type Definition = UnitImage;

    fn define(&self, name: &str, bytes: &[u8]) -> Result<UnitImage, DefineError> {
        if bytes.is_empty() {
            return Err(DefineError::Empty);
        }
        if let Some(magic) = &self.magic {
            if !bytes.starts_with(magic) {
                let seen = &bytes[..bytes.len().min(magic.len())];
                return Err(DefineError::BadMagic {
                    expected: hex::encode(magic),
                    found: hex::encode(seen),
                });
            }
        }
        Ok(UnitImage::new(name, bytes))
    }
}
