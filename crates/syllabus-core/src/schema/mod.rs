//! Versioned schemas for stored syllabus data.
//!
//! Stored blobs carry no version tag. Each entity declares a detector that
//! classifies a blob by its shape, a validator per version, and an upgrade
//! from every version to its successor. The [`Migrator`] drives a blob from
//! its detected version to the latest one, validating at each step.

mod engine;
mod registry;

pub use engine::*;
pub use registry::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kinds of stored data with versioned shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// One item's placement into a class
    Assignment,
    /// All of one item's assignments, keyed by collection
    ItemSyllabusData,
    /// Syllabus-level settings for every collection
    CollectionMetadata,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Assignment,
        EntityKind::ItemSyllabusData,
        EntityKind::CollectionMetadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::ItemSyllabusData => "item-data",
            Self::CollectionMetadata => "collection-metadata",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity {s:?}"))
    }
}

/// A single structural problem found while validating a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Location within the blob, `$` for the root
    pub path: String,
    pub message: String,
}

/// Structural diagnostics collected by a validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaErrors(Vec<FieldError>);

impl SchemaErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error at `path`.
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(path, message);
        errors
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Append `other`, nesting its paths under `prefix`.
    pub fn extend_nested(&mut self, prefix: &str, other: SchemaErrors) {
        for err in other.0 {
            let path = match err.path.as_str() {
                "$" => prefix.to_string(),
                rest => format!("{prefix}.{rest}"),
            };
            self.0.push(FieldError {
                path,
                message: err.message,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.path, err.message)?;
        }
        Ok(())
    }
}

impl From<serde_json::Error> for SchemaErrors {
    fn from(err: serde_json::Error) -> Self {
        Self::at("$", err.to_string())
    }
}
