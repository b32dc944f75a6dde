//! Archive-backed unit loader
//!
//! [`ArchiveModuleLoader`] resolves units by name against archives registered
//! at runtime. Resolution order for a unit that is not yet defined:
//!
//! 1. the delegate, if one is installed
//! 2. registered archives, earliest registration first
//!
//! Bytes extracted on the way are remembered so the used subset can be
//! repackaged with [`ArchiveModuleLoader::package`].

use crate::cache::{DefinitionCache, ExtractedBytes, ExtractedSnapshot};
use crate::config::LoaderConfig;
use crate::define::{ImageDefiner, UnitDefiner};
use crate::error::{LoadError, ResourceNotFound};
use crate::event::{EventHook, LoadEvent, UnitSource};
use crate::package::PackageMapping;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use unitpack_archive::{ArchiveBlob, ArchiveFormatError, ArchiveId, ArchiveRegistry, EntryStream};

/// Lookup consulted before any archive is scanned
pub type Delegate<T> = Arc<dyn Fn(&str) -> Option<Arc<T>> + Send + Sync>;

/// Loads units lazily from in-memory archives
pub struct ArchiveModuleLoader<D: UnitDefiner = ImageDefiner> {
    config: LoaderConfig,
    definer: D,
    registry: ArchiveRegistry,
    definitions: DefinitionCache<D::Definition>,
    extracted: ExtractedBytes,
    delegate: Option<Delegate<D::Definition>>,
    hook: Option<EventHook>,
}

impl Default for ArchiveModuleLoader<ImageDefiner> {
    fn default() -> Self {
        Self::new(ImageDefiner::default())
    }
}

impl<D: UnitDefiner> ArchiveModuleLoader<D> {
    /// Create a loader with the default configuration
    pub fn new(definer: D) -> Self {
        Self::with_config(LoaderConfig::default(), definer)
    }

    /// Create a loader with an explicit configuration
    pub fn with_config(config: LoaderConfig, definer: D) -> Self {
        Self {
            config,
            definer,
            registry: ArchiveRegistry::new(),
            definitions: DefinitionCache::new(),
            extracted: ExtractedBytes::new(),
            delegate: None,
            hook: None,
        }
    }

    /// Install a delegate asked for every unit before archives are scanned.
    ///
    /// A `Some` answer is adopted and cached as this loader's definition.
    pub fn with_delegate<F>(mut self, delegate: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<D::Definition>> + Send + Sync + 'static,
    {
        self.delegate = Some(Arc::new(delegate));
        self
    }

    /// Install a callback receiving every [`LoadEvent`]
    pub fn with_event_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoadEvent<'_>) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Registered archives
    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    /// Index and register an archive.
    ///
    /// # Returns
    /// * `Ok(ArchiveId)` - Archive appended after every earlier registration
    /// * `Err(ArchiveFormatError)` - Bytes are not an archive; nothing registered
    pub fn register_archive(
        &self,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<ArchiveId, ArchiveFormatError> {
        let blob = ArchiveBlob::parse(bytes)?;
        let entries = blob.index().len();
        let archive = self.registry.register(blob);
        self.emit(&LoadEvent::ArchiveRegistered { archive, entries });
        Ok(archive)
    }

    /// Check whether any registered archive lists the entry `name`
    pub fn supports_unit(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Return the definition of unit `name`, defining it on first request.
    ///
    /// Concurrent requests for one name share a single definition; requests
    /// for different names do not wait on each other. Failures leave no trace
    /// in either cache.
    pub fn load_unit(&self, name: &str) -> Result<Arc<D::Definition>, LoadError> {
        if let Some(hit) = self.definitions.get(name) {
            tracing::trace!(unit = name, "unit cache hit");
            return Ok(hit);
        }
        if !self.config.is_unit_name(name) {
            let path = self.config.unit_path(name);
            tracing::debug!(unit = name, "not a unit name");
            self.emit(&LoadEvent::UnitMissing { unit: name, path: &path });
            return Err(LoadError::NotFound {
                unit: name.to_owned(),
                path,
                consulted: Vec::new(),
            });
        }
        self.definitions
            .get_or_try_insert(name, || self.define_unit(name))
    }

    fn define_unit(&self, name: &str) -> Result<Arc<D::Definition>, LoadError> {
        if let Some(delegate) = &self.delegate {
            if let Some(found) = delegate(name) {
                tracing::trace!(unit = name, "unit supplied by delegate");
                self.emit(&LoadEvent::UnitDelegated { unit: name });
                return Ok(found);
            }
        }

        let path = self.config.unit_path(name);
        let (archive, bytes) = self.extract(name, &path)?;

        let definition = self
            .definer
            .define(name, &bytes)
            .map_err(|source| LoadError::Define {
                unit: name.to_owned(),
                source,
            })?;

        let size = bytes.len();
        self.extracted.record(name, bytes);

        tracing::debug!(unit = name, archive = %archive, size, "unit defined");
        self.emit(&LoadEvent::UnitDefined {
            unit: name,
            source: UnitSource::Archive(archive),
            size,
        });

        Ok(Arc::new(definition))
    }

    /// Read `path` from the first archive that lists it and can produce it
    fn extract(&self, name: &str, path: &str) -> Result<(ArchiveId, Arc<[u8]>), LoadError> {
        let candidates = self.registry.candidates(path);
        if candidates.is_empty() {
            tracing::debug!(unit = name, path, "unit not found in any archive");
            self.emit(&LoadEvent::UnitMissing { unit: name, path });
            return Err(LoadError::NotFound {
                unit: name.to_owned(),
                path: path.to_owned(),
                consulted: self.registry.ids(),
            });
        }

        let mut failures = Vec::new();
        for archive in candidates {
            match archive.read_entry(path, self.config.max_entry_size) {
                Ok(bytes) => return Ok((archive.id(), Arc::from(bytes))),
                Err(error) => {
                    tracing::warn!(unit = name, archive = %archive.id(), %error, "unreadable unit entry");
                    self.emit(&LoadEvent::EntryUnreadable {
                        entry: path,
                        archive: archive.id(),
                        error: &error,
                    });
                    failures.push((archive.id(), error));
                }
            }
        }

        Err(LoadError::Decode {
            unit: name.to_owned(),
            path: path.to_owned(),
            failures,
        })
    }

    /// Open a fresh stream over resource `name` from the first archive able to serve it
    pub fn resolve_resource(&self, name: &str) -> Result<ResourceStream, ResourceNotFound> {
        let mut unreadable = Vec::new();
        for archive in self.registry.candidates(name) {
            match archive.open_entry(name, self.config.max_entry_size) {
                Ok(stream) => {
                    tracing::trace!(resource = name, archive = %archive.id(), "resource opened");
                    return Ok(ResourceStream {
                        archive: archive.id(),
                        stream,
                    });
                }
                Err(error) => {
                    tracing::warn!(resource = name, archive = %archive.id(), %error, "unreadable resource entry");
                    self.emit(&LoadEvent::EntryUnreadable {
                        entry: name,
                        archive: archive.id(),
                        error: &error,
                    });
                    unreadable.push((archive.id(), error));
                }
            }
        }

        Err(ResourceNotFound {
            name: name.to_owned(),
            consulted: self.registry.ids(),
            unreadable,
        })
    }

    /// Copy of every unit's bytes extracted so far, keyed by unit name
    pub fn snapshot_extracted_bytes(&self) -> ExtractedSnapshot {
        self.extracted.snapshot()
    }

    /// Package of every unit defined from archive bytes so far
    pub fn package(&self) -> PackageMapping {
        PackageMapping::from(self.extracted.snapshot())
    }

    /// Check whether unit `name` has been defined
    pub fn is_loaded(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    /// Number of defined units
    pub fn loaded_count(&self) -> usize {
        self.definitions.len()
    }

    /// Logical names of every unit entry across all archives, sorted
    pub fn available_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .registry
            .entry_names()
            .iter()
            .filter_map(|path| self.config.unit_name(path))
            .collect();
        units.sort_unstable();
        units.dedup();
        units
    }

    fn emit(&self, event: &LoadEvent<'_>) {
        if let Some(hook) = &self.hook {
            hook(event);
        }
    }
}

impl<D: UnitDefiner> fmt::Debug for ArchiveModuleLoader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveModuleLoader")
            .field("config", &self.config)
            .field("archives", &self.registry.len())
            .field("definitions", &self.definitions)
            .field("extracted", &self.extracted.len())
            .field("delegate", &self.delegate.is_some())
            .finish()
    }
}

/// Stream over one resource, tagged with the archive that served it
#[derive(Debug)]
pub struct ResourceStream {
    archive: ArchiveId,
    stream: EntryStream,
}

impl ResourceStream {
    /// Archive the resource was read from
    pub fn archive(&self) -> ArchiveId {
        self.archive
    }

    /// Resource name
    pub fn name(&self) -> &str {
        self.stream.name()
    }

    /// Total resource size in bytes
    pub fn len(&self) -> usize {
        self.stream.len()
    }

    /// Check if the resource is empty
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Consume the stream and return the whole resource
    pub fn into_bytes(self) -> Vec<u8> {
        self.stream.into_bytes()
    }
}

impl Read for ResourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for ResourceStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}
