//! Configuration for syllabus-core
//!
//! Loaded from TOML, for example:
//!
//! ```toml
//! collection_metadata_key = "extensions.syllabus.collectionMetadata"
//! extra_field = "syllabus"
//! default_nomenclature = "class"
//! log_filter = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where syllabus data is stored and how it is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyllabusConfig {
    /// Preference key holding the collection metadata dictionary
    pub collection_metadata_key: String,
    /// Name of the extra-field line holding an item's syllabus data
    pub extra_field: String,
    /// Noun used for a class when a collection does not set one
    pub default_nomenclature: String,
    /// `tracing` filter used by binaries when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for SyllabusConfig {
    fn default() -> Self {
        Self {
            collection_metadata_key: "extensions.syllabus.collectionMetadata".to_string(),
            extra_field: "syllabus".to_string(),
            default_nomenclature: "class".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl SyllabusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// `<config dir>/syllabus/config.toml`
    pub fn standard_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("syllabus").join("config.toml"))
    }

    /// Load from the standard location, using defaults when no file exists.
    pub fn load_standard() -> Result<Self, ConfigError> {
        match Self::standard_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {:?}", path);
                Self::load_from(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_metadata_key.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "collection_metadata_key".to_string(),
            ));
        }
        if self.extra_field.trim().is_empty() {
            return Err(ConfigError::MissingField("extra_field".to_string()));
        }
        if self.extra_field.contains(&[':', '\n', '\r'][..]) {
            return Err(ConfigError::InvalidValue {
                field: "extra_field".to_string(),
                message: "must not contain ':' or line breaks".to_string(),
            });
        }
        if self.extra_field.trim() != self.extra_field {
            return Err(ConfigError::InvalidValue {
                field: "extra_field".to_string(),
                message: "must not start or end with whitespace".to_string(),
            });
        }
        if self.default_nomenclature.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "default_nomenclature".to_string(),
            ));
        }
        Ok(())
    }
}
