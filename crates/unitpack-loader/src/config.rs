//! Loader configuration
//!
//! Controls how logical unit names map onto archive entry paths and how large
//! a single extracted entry may grow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on the uncompressed size of one entry (64 MiB)
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse TOML
    #[error("Failed to parse loader config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid loader config: {0}")]
    ValidationError(String),
}

/// How unit names are turned into entry paths, plus extraction limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Suffix appended to every unit entry path (default: ".class")
    pub unit_suffix: String,

    /// Separator between namespace segments in a unit name (default: '.')
    pub namespace_separator: char,

    /// Separator between directories in an entry path (default: '/')
    pub path_separator: char,

    /// Largest uncompressed entry accepted, `None` for no limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entry_size: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            unit_suffix: ".class".to_string(),
            namespace_separator: '.',
            path_separator: '/',
            max_entry_size: Some(DEFAULT_MAX_ENTRY_SIZE),
        }
    }
}

impl LoaderConfig {
    /// Parse and validate a configuration from TOML.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Example
    /// ```text
    /// unit_suffix = ".bin"
    /// namespace_separator = "::"   # rejected: must be one character
    /// max_entry_size = 1048576
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can produce unambiguous paths
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "unit_suffix must not be empty".to_string(),
            ));
        }
        if self.namespace_separator == self.path_separator {
            return Err(ConfigError::ValidationError(format!(
                "namespace_separator and path_separator are both '{}'",
                self.path_separator
            )));
        }
        if self.max_entry_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_entry_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the unit suffix
    pub fn with_unit_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.unit_suffix = suffix.into();
        self
    }

    /// Replace the entry size limit
    pub fn with_max_entry_size(mut self, limit: Option<u64>) -> Self {
        self.max_entry_size = limit;
        self
    }

    /// Check whether `name` is a logical unit name.
    ///
    /// Entry-path spellings such as `"a/B"` are rejected so that each entry
    /// is reachable under exactly one name.
    pub fn is_unit_name(&self, name: &str) -> bool {
        !name.is_empty() && !name.contains(self.path_separator)
    }

    /// Entry path holding the unit `name`.
    ///
    /// `"a.b.C"` becomes `"a/b/C.class"` with the default settings.
    pub fn unit_path(&self, name: &str) -> String {
        let mut path: String = name
            .chars()
            .map(|c| {
                if c == self.namespace_separator {
                    self.path_separator
                } else {
                    c
                }
            })
            .collect();
        path.push_str(&self.unit_suffix);
        path
    }

    /// Logical unit name for an entry path, if the path names a unit
    pub fn unit_name(&self, path: &str) -> Option<String> {
        let stem = path.strip_suffix(self.unit_suffix.as_str())?;
        if stem.is_empty() || stem.ends_with(self.path_separator) {
            return None;
        }
        Some(
            stem.chars()
                .map(|c| {
                    if c == self.path_separator {
                        self.namespace_separator
                    } else {
                        c
                    }
                })
                .collect(),
        )
    }
}
