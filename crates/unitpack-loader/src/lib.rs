//! unitpack loader
//!
//! Loads compiled units on demand from archives held in memory:
//! - [`ArchiveModuleLoader`]: resolves units against registered archives,
//!   defines each at most once, and records the bytes it used
//! - [`PackageModuleLoader`]: defines units from a flat [`PackageMapping`]
//!   with no archive dependency
//! - [`PackageMapping`]: the recorded subset, exportable as a checksummed bundle
//!
//! # Example
//!
//! ```text
//! let loader = ArchiveModuleLoader::new(ImageDefiner::new());
//! loader.register_archive(fetched_bytes)?;
//! let unit = loader.load_unit("com.example.Main")?;
//!
//! let slim = PackageModuleLoader::from_mapping(loader.package());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive_loader;
pub mod cache;
pub mod config;
pub mod define;
pub mod error;
pub mod event;
pub mod package;
pub mod package_loader;

pub use archive_loader::{ArchiveModuleLoader, Delegate, ResourceStream};
pub use cache::{DefinitionCache, ExtractedBytes, ExtractedSnapshot};
pub use config::{ConfigError, LoaderConfig, DEFAULT_MAX_ENTRY_SIZE};
pub use define::{ImageDefiner, UnitDefiner, UnitImage};
pub use error::{DefineError, LoadError, PackageLoadError, ResourceNotFound};
pub use event::{EventHook, LoadEvent, UnitSource};
pub use package::{BundleError, ManifestEntry, PackageManifest, PackageMapping, MANIFEST_PATH};
pub use package_loader::PackageModuleLoader;

pub use unitpack_archive::{ArchiveFormatError, ArchiveId, EntryError};
