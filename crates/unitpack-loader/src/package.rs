//! Flat unit packages
//!
//! A [`PackageMapping`] is an immutable name→bytes table with no tie to the
//! archive the bytes came from. It can be written out as a bundle: an archive
//! holding every unit at its entry path plus a JSON manifest of checksums at
//! [`MANIFEST_PATH`]. Bundles are ordinary archives, so they can also be
//! registered with an [`ArchiveModuleLoader`](crate::ArchiveModuleLoader).

use crate::cache::ExtractedSnapshot;
use crate::config::LoaderConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use unitpack_archive::{
    ArchiveBlob, ArchiveFormatError, ArchiveWriter, Compression, EntryError, WriteError,
};

/// Entry path of the manifest inside a bundle
pub const MANIFEST_PATH: &str = "META-INF/unitpack.json";

/// Current manifest format
pub const MANIFEST_FORMAT: u32 = 1;

/// Errors that can occur while writing or reading a bundle
#[derive(Debug, Error)]
pub enum BundleError {
    /// Bundle bytes are not an archive
    #[error("Invalid bundle archive: {0}")]
    Format(#[from] ArchiveFormatError),

    /// Writing the bundle failed
    #[error("Failed to write bundle: {0}")]
    Write(#[from] WriteError),

    /// Reading a bundle entry failed
    #[error("Failed to read bundle entry: {0}")]
    Entry(#[from] EntryError),

    /// The bundle has no manifest
    #[error("Bundle has no manifest at {MANIFEST_PATH}")]
    MissingManifest,

    /// The manifest is not valid JSON
    #[error("Invalid bundle manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The manifest uses an unknown format
    #[error("Unsupported manifest format {0} (current: {MANIFEST_FORMAT})")]
    UnsupportedFormat(u32),

    /// A manifest record names an invalid unit or the wrong entry path
    #[error("Manifest entry for unit '{unit}' has path '{path}', expected '{expected}'")]
    PathMismatch {
        /// Unit name
        unit: String,
        /// Path in the manifest
        path: String,
        /// Path derived from the unit name
        expected: String,
    },

    /// The manifest lists a unit more than once
    #[error("Unit '{0}' is listed more than once in the manifest")]
    DuplicateUnit(String),

    /// A unit's size differs from the manifest
    #[error("Size mismatch for unit '{unit}': expected {expected}, got {actual}")]
    SizeMismatch {
        /// Unit name
        unit: String,
        /// Size in the manifest
        expected: u64,
        /// Size in the bundle
        actual: u64,
    },

    /// A unit's checksum differs from the manifest
    #[error("Checksum mismatch for unit '{unit}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Unit name
        unit: String,
        /// Hex SHA-256 in the manifest
        expected: String,
        /// Hex SHA-256 of the bundle entry
        actual: String,
    },
}

/// Bundle manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    /// Manifest format version
    pub format: u32,

    /// One record per unit, sorted by unit name
    pub units: Vec<ManifestEntry>,
}

/// Manifest record for one unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Unit name
    pub unit: String,

    /// Entry path inside the bundle
    pub path: String,

    /// Size in bytes
    pub size: u64,

    /// Hex SHA-256 of the bytes
    pub sha256: String,
}

/// Immutable name→bytes table of units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMapping {
    units: Arc<BTreeMap<String, Arc<[u8]>>>,
}

impl PackageMapping {
    /// Wrap a table of unit bytes
    pub fn new(units: BTreeMap<String, Arc<[u8]>>) -> Self {
        Self {
            units: Arc::new(units),
        }
    }

    /// Bytes of unit `name`
    pub fn get(&self, name: &str) -> Option<&Arc<[u8]>> {
        self.units.get(name)
    }

    /// Check whether the package holds unit `name`
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the package is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit names, sorted
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Units and their bytes, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.units.iter().map(|(name, bytes)| (name.as_str(), &**bytes))
    }

    /// Describe every unit with its entry path and checksum
    pub fn manifest(&self, config: &LoaderConfig) -> PackageManifest {
        let units = self
            .iter()
            .map(|(unit, bytes)| ManifestEntry {
                unit: unit.to_owned(),
                path: config.unit_path(unit),
                size: bytes.len() as u64,
                sha256: hex::encode(Sha256::digest(bytes)),
            })
            .collect();

        PackageManifest {
            format: MANIFEST_FORMAT,
            units,
        }
    }

    /// Write the package as a bundle archive
    pub fn to_bundle(&self, config: &LoaderConfig) -> Result<Vec<u8>, BundleError> {
        let manifest = self.manifest(config);
        let mut writer = ArchiveWriter::new(Compression::Deflated);

        for entry in &manifest.units {
            if let Some(bytes) = self.units.get(&entry.unit) {
                writer.add_entry(&entry.path, bytes)?;
            }
        }
        writer.add_entry(MANIFEST_PATH, &serde_json::to_vec_pretty(&manifest)?)?;

        let bundle = writer.finish()?;
        tracing::debug!(units = self.len(), bytes = bundle.len(), "bundle written");
        Ok(bundle)
    }

    /// Read a bundle archive back into a package, verifying every unit
    pub fn from_bundle(bytes: impl Into<Arc<[u8]>>, config: &LoaderConfig) -> Result<Self, BundleError> {
        let blob = ArchiveBlob::parse(bytes)?;
        if !blob.contains(MANIFEST_PATH) {
            return Err(BundleError::MissingManifest);
        }

        let manifest: PackageManifest =
            serde_json::from_slice(&blob.read_entry(MANIFEST_PATH, config.max_entry_size)?)?;
        if manifest.format != MANIFEST_FORMAT {
            return Err(BundleError::UnsupportedFormat(manifest.format));
        }

        let mut units = BTreeMap::new();
        for entry in manifest.units {
            let expected = config.unit_path(&entry.unit);
            if !config.is_unit_name(&entry.unit) || entry.path != expected {
                return Err(BundleError::PathMismatch {
                    unit: entry.unit,
                    path: entry.path,
                    expected,
                });
            }
            if units.contains_key(&entry.unit) {
                return Err(BundleError::DuplicateUnit(entry.unit));
            }

            let data = blob.read_entry(&entry.path, config.max_entry_size)?;

            let actual_size = data.len() as u64;
            if actual_size != entry.size {
                return Err(BundleError::SizeMismatch {
                    unit: entry.unit,
                    expected: entry.size,
                    actual: actual_size,
                });
            }

            let actual_sha = hex::encode(Sha256::digest(&data));
            if actual_sha != entry.sha256 {
                return Err(BundleError::ChecksumMismatch {
                    unit: entry.unit,
                    expected: entry.sha256,
                    actual: actual_sha,
                });
            }

            units.insert(entry.unit, Arc::from(data));
        }

        tracing::debug!(units = units.len(), "bundle read");
        Ok(Self::new(units))
    }
}

impl From<ExtractedSnapshot> for PackageMapping {
    fn from(snapshot: ExtractedSnapshot) -> Self {
        Self::new(snapshot)
    }
}

impl FromIterator<(String, Vec<u8>)> for PackageMapping {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, bytes)| (name, Arc::<[u8]>::from(bytes)))
                .collect(),
        )
    }
}
