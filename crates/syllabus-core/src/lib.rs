//! Syllabus Core - Versioned syllabus metadata for reference-manager collections
//!
//! This crate stores course-planning data alongside a reference library:
//!
//! - **Schema**: Per-entity version registries, heuristic version detection and
//!   the migration engine that walks stored data up to the latest shape
//! - **Entities**: Assignments, per-item syllabus data and the collection
//!   metadata dictionary, each with its full version history
//! - **Storage**: Preference and item-field store traits, in-memory and file
//!   backed implementations, and `name: value` extra-field lines
//! - **Syllabus**: Typed read/modify/write access over the stores
//! - **Schedule**: Readings grouped by class for display or export
//! - **Config**: Storage keys and display defaults loaded from TOML
//!
//! # Lazy migration
//!
//! Stored data never carries a version tag. Reads detect the shape, migrate
//! in memory and return the latest version; the migrated form is written
//! only when the caller next changes that data.
//!
//! ```text
//! raw JSON → detect → validate(vN) → upgrade → validate(vN+1) → … → latest
//! ```

pub mod collection;
pub mod config;
pub mod entities;
pub mod error;
pub mod priority;
pub mod schedule;
pub mod schema;
pub mod storage;
pub mod syllabus;

pub use collection::{CollectionRef, CollectionResolver, NoCollections, ParseCollectionRefError};
pub use config::SyllabusConfig;
pub use entities::{
    Assignment, AssignmentDraft, AssignmentStatus, ClassMetadata, ClassStatus,
    CollectionDictionary, CollectionMetadata, ItemSyllabusData,
};
pub use error::{ConfigError, MigrationError, RegistryError, Result, StorageError, SyllabusError};
pub use priority::{Priority, PriorityDefinition, PrioritySet};
pub use schedule::{ReadingSchedule, ScheduledClass, ScheduledReading};
pub use schema::{
    EntityKind, FieldError, Migrated, Migrator, SchemaErrors, SchemaRegistry, StepWarning,
};
pub use storage::{
    ExtraField, FilePreferences, ItemFieldStore, MemoryItemFields, MemoryPreferences,
    PreferenceStore,
};
pub use syllabus::Syllabus;
