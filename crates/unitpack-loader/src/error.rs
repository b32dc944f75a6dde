//! Error types shared by the loaders

use thiserror::Error;
use unitpack_archive::{ArchiveId, EntryError};

/// Errors raised by a [`UnitDefiner`](crate::UnitDefiner)
#[derive(Debug, Error)]
pub enum DefineError {
    /// The unit has no bytes
    #[error("Unit bytes are empty")]
    Empty,

    /// The unit does not start with the expected header
    #[error("Invalid unit header: expected {expected}, got {found}")]
    BadMagic {
        /// Expected header, hex encoded
        expected: String,
        /// Observed header, hex encoded
        found: String,
    },

    /// Definer-specific rejection
    #[error("{0}")]
    Rejected(String),
}

/// Errors raised by [`ArchiveModuleLoader::load_unit`](crate::ArchiveModuleLoader::load_unit)
#[derive(Debug, Error)]
pub enum LoadError {
    /// No registered archive lists the unit's entry path
    #[error(
        "Unit '{unit}' not found: no entry '{path}' in {} registered archive(s)",
        .consulted.len()
    )]
    NotFound {
        /// Requested unit name
        unit: String,
        /// Entry path derived from the unit name
        path: String,
        /// Archives that were consulted
        consulted: Vec<ArchiveId>,
    },

    /// Every archive listing the entry failed to produce its bytes
    #[error("Unit '{unit}' could not be read from '{path}': {}", describe_failures(.failures))]
    Decode {
        /// Requested unit name
        unit: String,
        /// Entry path derived from the unit name
        path: String,
        /// Per-archive failure, in scan order
        failures: Vec<(ArchiveId, EntryError)>,
    },

    /// The bytes were read but the definer rejected them
    #[error("Unit '{unit}' could not be defined: {source}")]
    Define {
        /// Requested unit name
        unit: String,
        /// Definer error
        #[source]
        source: DefineError,
    },
}

impl LoadError {
    /// Name of the unit that failed to load
    pub fn unit(&self) -> &str {
        match self {
            LoadError::NotFound { unit, .. }
            | LoadError::Decode { unit, .. }
            | LoadError::Define { unit, .. } => unit,
        }
    }

    /// Check whether the failure is a plain miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

/// No registered archive could serve a resource
#[derive(Debug, Error)]
#[error(
    "Resource '{name}' not found in {} registered archive(s){}",
    .consulted.len(),
    describe_unreadable(.unreadable)
)]
pub struct ResourceNotFound {
    /// Requested resource name
    pub name: String,
    /// Archives that were consulted
    pub consulted: Vec<ArchiveId>,
    /// Archives that listed the resource but could not read it
    pub unreadable: Vec<(ArchiveId, EntryError)>,
}

/// Errors raised by [`PackageModuleLoader::load_unit`](crate::PackageModuleLoader::load_unit)
#[derive(Debug, Error)]
pub enum PackageLoadError {
    /// The package mapping has no entry for the unit
    #[error("Unit '{unit}' not found in package of {available} unit(s)")]
    UnitNotFound {
        /// Requested unit name
        unit: String,
        /// Number of units in the package
        available: usize,
    },

    /// The definer rejected the packaged bytes
    #[error("Unit '{unit}' could not be defined: {source}")]
    Define {
        /// Requested unit name
        unit: String,
        /// Definer error
        #[source]
        source: DefineError,
    },
}

impl PackageLoadError {
    /// Name of the unit that failed to load
    pub fn unit(&self) -> &str {
        match self {
            PackageLoadError::UnitNotFound { unit, .. } | PackageLoadError::Define { unit, .. } => {
                unit
            }
        }
    }
}

fn describe_failures(failures: &[(ArchiveId, EntryError)]) -> String {
    failures
        .iter()
        .map(|(archive, error)| format!("{}: {}", archive, error))
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_unreadable(unreadable: &[(ArchiveId, EntryError)]) -> String {
    if unreadable.is_empty() {
        String::new()
    } else {
        format!(" ({} listed it but failed: {})", unreadable.len(), describe_failures(unreadable))
    }
}
