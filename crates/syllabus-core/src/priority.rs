//! Reading priorities and their display definitions.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaErrors;

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^[0-9A-Fa-f]{6}$").unwrap();
}

/// Importance tier of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    CourseInfo,
    Essential,
    Recommended,
    Optional,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::CourseInfo,
        Priority::Essential,
        Priority::Recommended,
        Priority::Optional,
    ];

    /// Stored identifier, also the id of its priority definition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseInfo => "course-info",
            Self::Essential => "essential",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
        }
    }

    /// Built-in display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CourseInfo => "Course Info",
            Self::Essential => "Essential",
            Self::Recommended => "Recommended",
            Self::Optional => "Optional",
        }
    }

    /// Built-in colour, six hex digits.
    pub fn default_color(&self) -> &'static str {
        match self {
            Self::CourseInfo => "1E88E5",
            Self::Essential => "E53935",
            Self::Recommended => "FB8C00",
            Self::Optional => "43A047",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-customisable priority: display name, colour and sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityDefinition {
    pub id: String,
    pub name: String,
    pub color: String,
    pub order: i32,
}

impl PriorityDefinition {
    pub(crate) fn check(&self, path: &str, errors: &mut SchemaErrors) {
        if self.id.is_empty() {
            errors.push(format!("{path}.id"), "must not be empty");
        }
        if !is_valid_color(&self.color) {
            errors.push(
                format!("{path}.color"),
                format!("{:?} is not six hex digits", self.color),
            );
        }
    }
}

/// Whether `color` is exactly six hex digits, without a leading `#`.
pub fn is_valid_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}

/// The built-in definitions, in display order.
pub fn default_priorities() -> Vec<PriorityDefinition> {
    Priority::ALL
        .iter()
        .zip(0..)
        .map(|(p, order)| PriorityDefinition {
            id: p.as_str().to_string(),
            name: p.display_name().to_string(),
            color: p.default_color().to_string(),
            order,
        })
        .collect()
}

/// The effective priorities of a collection: built-ins overridden by
/// custom definitions with the same id, sorted by order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritySet {
    definitions: Vec<PriorityDefinition>,
}

impl PrioritySet {
    pub fn new(custom: Option<&[PriorityDefinition]>) -> Self {
        let mut definitions = default_priorities();
        for def in custom.unwrap_or_default() {
            match definitions.iter_mut().find(|d| d.id == def.id) {
                Some(existing) => *existing = def.clone(),
                None => definitions.push(def.clone()),
            }
        }
        definitions.sort_by_key(|d| d.order);
        Self { definitions }
    }

    pub fn definitions(&self) -> &[PriorityDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&PriorityDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn resolve(&self, priority: Priority) -> Option<&PriorityDefinition> {
        self.get(priority.as_str())
    }

    /// Sort key for a possibly missing priority; unprioritised sorts last.
    pub fn rank(&self, priority: Option<Priority>) -> i32 {
        priority
            .and_then(|p| self.resolve(p))
            .map_or(i32::MAX, |d| d.order)
    }
}

impl Default for PrioritySet {
    fn default() -> Self {
        Self::new(None)
    }
}
