//! Error types for syllabus-core

use thiserror::Error;

use crate::collection::CollectionRef;
use crate::schema::{EntityKind, SchemaErrors};

/// Result type alias for syllabus operations
pub type Result<T> = std::result::Result<T, SyllabusError>;

/// Main error type for syllabus operations
#[derive(Error, Debug)]
pub enum SyllabusError {
    /// Stored data could not be migrated
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// A schema registry was declared incorrectly
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON encoding errors on the write path
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Class numbers start at 1
    #[error("Invalid class number: {0}")]
    InvalidClassNumber(u32),

    /// Priority colours are six hex digits
    #[error("Invalid priority colour: {0:?}")]
    InvalidColor(String),

    /// Reading dates are ISO-8601 dates or date-times
    #[error("Invalid reading date: {0:?}")]
    InvalidReadingDate(String),

    /// Metadata rejected by validation before it was written
    #[error("Invalid collection metadata: {0}")]
    InvalidMetadata(SchemaErrors),

    /// No assignment with this id exists for the item in this collection
    #[error("Assignment {id} not found for item {item} in collection {collection}")]
    AssignmentNotFound {
        item: String,
        collection: CollectionRef,
        id: String,
    },

    /// A stored entry that could not be read would be lost by this write
    #[error("{entity} entry {key:?} in {location} is unreadable; refusing to overwrite it")]
    UnreadableEntry {
        entity: EntityKind,
        location: String,
        key: String,
    },
}

/// Errors returned by the migration engine.
///
/// Only `UnregisteredEntity` indicates a bug; the other variants describe
/// stored data and callers substitute an empty value for them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// The blob is not a JSON object
    #[error("{entity} data is not a JSON object")]
    MalformedInput { entity: EntityKind },

    /// The blob is an object but fails validation at its detected version
    #[error("{entity} data does not match version {version}: {errors}")]
    SchemaViolation {
        entity: EntityKind,
        version: u32,
        errors: SchemaErrors,
    },

    /// No registry was installed for this entity
    #[error("No schema registered for {0}")]
    UnregisteredEntity(EntityKind),
}

/// Mistakes in a registry declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{entity} registry declares no versions")]
    Empty { entity: EntityKind },

    #[error("{entity} registry is missing version {version}")]
    MissingVersion { entity: EntityKind, version: u32 },

    #[error("{entity} registry declares version {version} beyond latest {latest}")]
    UnexpectedVersion {
        entity: EntityKind,
        version: u32,
        latest: u32,
    },

    #[error("{entity} version 1 cannot declare an upgrade")]
    RootUpgrade { entity: EntityKind },

    #[error("{entity} version {version} has no upgrade from the previous version")]
    MissingUpgrade { entity: EntityKind, version: u32 },
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The host does not know this item
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings
    #[error("Corrupt preference file: {0}")]
    Corrupt(String),

    /// Lock poisoned by a panicking writer
    #[error("Storage lock poisoned: {0}")]
    Poisoned(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display() {
        let err = RegistryError::MissingUpgrade {
            entity: EntityKind::Assignment,
            version: 2,
        };
        assert_eq!(
            err.to_string(),
            "assignment version 2 has no upgrade from the previous version"
        );
    }

    #[test]
    fn migration_error_display() {
        let err = MigrationError::MalformedInput {
            entity: EntityKind::ItemSyllabusData,
        };
        assert!(err.to_string().contains("not a JSON object"));
    }
}
