//! Package-backed unit loader
//!
//! [`PackageModuleLoader`] defines units straight from a [`PackageMapping`].
//! It has no archives, no delegate and no resource lookup: a unit is either
//! in the mapping or it does not exist.

use crate::cache::DefinitionCache;
use crate::define::{ImageDefiner, UnitDefiner};
use crate::error::PackageLoadError;
use crate::event::{EventHook, LoadEvent, UnitSource};
use crate::package::PackageMapping;
use std::fmt;
use std::sync::Arc;

/// Loads units from a flat name→bytes mapping
pub struct PackageModuleLoader<D: UnitDefiner = ImageDefiner> {
    mapping: PackageMapping,
    definer: D,
    definitions: DefinitionCache<D::Definition>,
    hook: Option<EventHook>,
}

impl PackageModuleLoader<ImageDefiner> {
    /// Create a loader producing [`UnitImage`](crate::UnitImage)s
    pub fn from_mapping(mapping: PackageMapping) -> Self {
        Self::new(mapping, ImageDefiner::default())
    }
}

impl<D: UnitDefiner> PackageModuleLoader<D> {
    /// Create a loader over `mapping`
    pub fn new(mapping: PackageMapping, definer: D) -> Self {
        Self {
            mapping,
            definer,
            definitions: DefinitionCache::new(),
            hook: None,
        }
    }

    /// Install a callback receiving every [`LoadEvent`]
    pub fn with_event_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoadEvent<'_>) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// The package this loader serves
    pub fn mapping(&self) -> &PackageMapping {
        &self.mapping
    }

    /// Check whether the package holds unit `name`
    pub fn supports_unit(&self, name: &str) -> bool {
        self.mapping.contains(name)
    }

    /// Return the definition of unit `name`, defining it on first request
    pub fn load_unit(&self, name: &str) -> Result<Arc<D::Definition>, PackageLoadError> {
        if let Some(hit) = self.definitions.get(name) {
            return Ok(hit);
        }
        self.definitions
            .get_or_try_insert(name, || self.define_unit(name))
    }

    fn define_unit(&self, name: &str) -> Result<Arc<D::Definition>, PackageLoadError> {
        let bytes = self
            .mapping
            .get(name)
            .ok_or_else(|| PackageLoadError::UnitNotFound {
                unit: name.to_owned(),
                available: self.mapping.len(),
            })?;

        let definition = self
            .definer
            .define(name, bytes)
            .map_err(|source| PackageLoadError::Define {
                unit: name.to_owned(),
                source,
            })?;

        tracing::debug!(unit = name, size = bytes.len(), "unit defined from package");
        if let Some(hook) = &self.hook {
            hook(&LoadEvent::UnitDefined {
                unit: name,
                source: UnitSource::Package,
                size: bytes.len(),
            });
        }

        Ok(Arc::new(definition))
    }

    /// Check whether unit `name` has been defined
    pub fn is_loaded(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    /// Number of defined units
    pub fn loaded_count(&self) -> usize {
        self.definitions.len()
    }
}

impl<D: UnitDefiner> fmt::Debug for PackageModuleLoader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageModuleLoader")
            .field("units", &self.mapping.len())
            .field("definitions", &self.definitions)
            .finish()
    }
}
