//! Assignments: one item's placement into one class of a syllabus.
//!
//! # Versions
//!
//! - 1: `{classNumber?, priority?, classInstruction?, status?}` with no id
//! - 2: the same fields plus a stable `id`
//!
//! The presence of `id` is the version discriminant, so an id generated
//! during migration is never regenerated. Ids given to legacy records are
//! derived from their content, so reading the same unmigrated record twice
//! yields the same id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::collection::NoCollections;
use crate::error::{MigrationError, RegistryError};
use crate::priority::Priority;
use crate::schema::{
    migrate_with, upgrader, validator, EntityKind, SchemaErrors, SchemaRegistry, StepWarning,
    VersionSpec,
};

/// Latest assignment version
pub const LATEST_VERSION: u32 = 2;

/// Namespace for ids derived from legacy records
const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8d3f_61a2_4c7e_4b19_a5d0_2e96_c1f4_7b38);

/// Per-item progress within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStatus {
    Done,
    Absent,
}

/// An item's placement into a class of one collection's syllabus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssignmentStatus>,
}

impl Assignment {
    /// Create an assignment with a freshly generated id.
    pub fn new(draft: AssignmentDraft) -> Self {
        Self {
            id: new_assignment_id(),
            class_number: draft.class_number,
            priority: draft.priority,
            class_instruction: draft.class_instruction,
            status: draft.status,
        }
    }

    /// The editable fields of this assignment.
    pub fn draft(&self) -> AssignmentDraft {
        AssignmentDraft {
            class_number: self.class_number,
            priority: self.priority,
            class_instruction: self.class_instruction.clone(),
            status: self.status,
        }
    }

    fn check(&self, errors: &mut SchemaErrors) {
        if self.id.is_empty() {
            errors.push("id", "must not be empty");
        }
        check_class_number(self.class_number, errors);
    }
}

/// The editable fields of an assignment; also the id-less v1 shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssignmentStatus>,
}

impl AssignmentDraft {
    /// Whether any of the fields that place an item in a syllabus is set.
    ///
    /// Status alone does not count.
    pub fn is_meaningful(&self) -> bool {
        self.class_number.is_some() || self.priority.is_some() || self.class_instruction.is_some()
    }

    pub(crate) fn check(&self, errors: &mut SchemaErrors) {
        check_class_number(self.class_number, errors);
    }
}

fn check_class_number(class_number: Option<u32>, errors: &mut SchemaErrors) {
    if class_number == Some(0) {
        errors.push("classNumber", "must be a positive integer");
    }
}

/// Generate an opaque assignment id.
pub fn new_assignment_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The id of a legacy record, derived from `scope` (where the record is
/// stored) and its fields.
pub fn legacy_assignment_id(scope: &str, draft: &AssignmentDraft) -> String {
    let fields = serde_json::to_string(draft).unwrap_or_default();
    let name = format!("{scope}\n{fields}");
    Uuid::new_v5(&LEGACY_ID_NAMESPACE, name.as_bytes())
        .simple()
        .to_string()
}

/// Give an id-less raw assignment its derived id. Returns `None` when `raw`
/// already has an id or is not a readable draft.
pub(crate) fn with_legacy_id(raw: &Value, scope: &str) -> Option<Value> {
    if detect(raw) != Some(1) {
        return None;
    }
    let draft = AssignmentDraft::deserialize(raw).ok()?;
    let mut seeded = raw.as_object()?.clone();
    seeded.insert(
        "id".to_string(),
        Value::String(legacy_assignment_id(scope, &draft)),
    );
    Some(Value::Object(seeded))
}

/// `id` absent or null means v1.
pub fn detect(raw: &Value) -> Option<u32> {
    let map = raw.as_object()?;
    match map.get("id") {
        None | Some(Value::Null) => Some(1),
        Some(_) => Some(2),
    }
}

fn parse_v1(raw: &Value) -> Result<AssignmentDraft, SchemaErrors> {
    let draft = AssignmentDraft::deserialize(raw)?;
    let mut errors = SchemaErrors::new();
    draft.check(&mut errors);
    errors.into_result(draft)
}

fn parse_v2(raw: &Value) -> Result<Assignment, SchemaErrors> {
    let assignment = Assignment::deserialize(raw)?;
    let mut errors = SchemaErrors::new();
    assignment.check(&mut errors);
    errors.into_result(assignment)
}

fn upgrade_v1(draft: AssignmentDraft) -> Value {
    let assignment = Assignment {
        id: legacy_assignment_id("", &draft),
        ..Assignment::new(draft)
    };
    serde_json::to_value(assignment).unwrap_or(Value::Null)
}

/// Schema registry for assignments.
pub fn registry() -> Result<SchemaRegistry, RegistryError> {
    let mut versions = BTreeMap::new();
    versions.insert(1, VersionSpec::root(validator(parse_v1)));
    versions.insert(
        2,
        VersionSpec::upgraded(
            validator(parse_v2),
            upgrader(|draft: AssignmentDraft, _| upgrade_v1(draft)),
        ),
    );
    SchemaRegistry::register(EntityKind::Assignment, LATEST_VERSION, detect, versions)
}

/// Migrate one raw assignment with `registry` and decode it.
pub fn migrate_assignment(
    registry: &SchemaRegistry,
    raw: &Value,
) -> Result<(Assignment, Vec<StepWarning>), MigrationError> {
    let migrated = migrate_with(registry, raw, &NoCollections)?;
    let assignment = Assignment::deserialize(&migrated.value).map_err(|err| {
        MigrationError::SchemaViolation {
            entity: EntityKind::Assignment,
            version: LATEST_VERSION,
            errors: err.into(),
        }
    })?;
    Ok((assignment, migrated.warnings))
}
