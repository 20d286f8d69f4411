//! Item syllabus data: every assignment of one item, keyed by collection.
//!
//! # Versions
//!
//! - 1: numeric collection id → single assignment object
//! - 2: numeric collection id → array of assignments
//! - 3: `"<libraryId>:<collectionKey>"` → array of assignments
//!
//! Both upgrades are lossy on purpose. 1 → 2 drops assignments with no
//! class number, priority or instruction. 2 → 3 drops collections that no
//! longer resolve.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::assignment::{migrate_assignment, with_legacy_id, Assignment, AssignmentDraft};
use crate::collection::{is_plain_integer, parse_numeric_id, CollectionRef, CollectionResolver};
use crate::error::{MigrationError, RegistryError};
use crate::schema::{upgrader, validator, EntityKind, SchemaErrors, SchemaRegistry, VersionSpec};

/// Latest item data version
pub const LATEST_VERSION: u32 = 3;

/// All assignments of one item, keyed by durable collection reference.
///
/// Every key maps to a non-empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemSyllabusData {
    entries: BTreeMap<CollectionRef, Vec<Assignment>>,
}

impl ItemSyllabusData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assignments in `collection`, empty when there are none.
    pub fn assignments(&self, collection: &CollectionRef) -> &[Assignment] {
        self.entries
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionRef> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CollectionRef, &[Assignment])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn push(&mut self, collection: CollectionRef, assignment: Assignment) {
        self.entries.entry(collection).or_default().push(assignment);
    }

    pub fn find_mut(&mut self, collection: &CollectionRef, id: &str) -> Option<&mut Assignment> {
        self.entries
            .get_mut(collection)?
            .iter_mut()
            .find(|a| a.id == id)
    }

    /// Remove one assignment, dropping the collection if it empties.
    pub fn remove(&mut self, collection: &CollectionRef, id: &str) -> Option<Assignment> {
        let list = self.entries.get_mut(collection)?;
        let index = list.iter().position(|a| a.id == id)?;
        let removed = list.remove(index);
        if list.is_empty() {
            self.entries.remove(collection);
        }
        Some(removed)
    }

    /// Remove every assignment in `collection`.
    pub fn clear_collection(&mut self, collection: &CollectionRef) -> Vec<Assignment> {
        self.entries.remove(collection).unwrap_or_default()
    }
}

/// Version 1: numeric id → single legacy assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct ItemDataV1(BTreeMap<String, AssignmentDraft>);

/// Version 2: numeric id → assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct ItemDataV2(BTreeMap<String, Vec<Assignment>>);

/// v1 if any value is a bare object, else v2 if any key is numeric, else v3.
/// An empty map has no evidence of an old format and is v3.
pub fn detect(raw: &Value) -> Option<u32> {
    let map = raw.as_object()?;
    if map.values().any(Value::is_object) {
        Some(1)
    } else if map.keys().any(|k| is_plain_integer(k)) {
        Some(2)
    } else {
        Some(3)
    }
}

fn as_object<'a>(raw: &'a Value) -> Result<&'a Map<String, Value>, SchemaErrors> {
    raw.as_object()
        .ok_or_else(|| SchemaErrors::at("$", "expected an object"))
}

fn parse_v1(raw: &Value) -> Result<ItemDataV1, SchemaErrors> {
    let mut errors = SchemaErrors::new();
    let mut entries = BTreeMap::new();
    for (key, value) in as_object(raw)? {
        if parse_numeric_id(key).is_none() {
            errors.push(key.as_str(), "expected a numeric collection id");
            continue;
        }
        if !value.is_object() {
            errors.push(key.as_str(), "expected an assignment object");
            continue;
        }
        match AssignmentDraft::deserialize(value) {
            Ok(draft) => {
                let mut nested = SchemaErrors::new();
                draft.check(&mut nested);
                if nested.is_empty() {
                    entries.insert(key.clone(), draft);
                } else {
                    errors.extend_nested(key, nested);
                }
            }
            Err(err) => errors.extend_nested(key, err.into()),
        }
    }
    errors.into_result(ItemDataV1(entries))
}

/// Parse `key → [assignment]` pairs, migrating each assignment. Keys with
/// empty arrays are dropped.
fn parse_lists<K, F>(
    raw: &Value,
    assignments: &SchemaRegistry,
    parse_key: F,
) -> Result<BTreeMap<K, Vec<Assignment>>, SchemaErrors>
where
    K: Ord,
    F: Fn(&str) -> Result<K, String>,
{
    let mut errors = SchemaErrors::new();
    let mut entries = BTreeMap::new();
    for (key, value) in as_object(raw)? {
        let parsed_key = match parse_key(key) {
            Ok(k) => k,
            Err(message) => {
                errors.push(key.as_str(), message);
                continue;
            }
        };
        let Some(items) = value.as_array() else {
            errors.push(key.as_str(), "expected an array of assignments");
            continue;
        };
        let mut list = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("{key}[{i}]");
            let seeded = with_legacy_id(item, &path);
            match migrate_assignment(assignments, seeded.as_ref().unwrap_or(item)) {
                Ok((assignment, warnings)) => {
                    for warning in warnings {
                        tracing::warn!("{}: {}", path, warning);
                    }
                    list.push(assignment);
                }
                Err(MigrationError::SchemaViolation { errors: nested, .. }) => {
                    errors.extend_nested(&path, nested)
                }
                Err(err) => errors.push(path, err.to_string()),
            }
        }
        if !list.is_empty() {
            entries.insert(parsed_key, list);
        }
    }
    errors.into_result(entries)
}

fn parse_v2(raw: &Value, assignments: &SchemaRegistry) -> Result<ItemDataV2, SchemaErrors> {
    parse_lists(raw, assignments, |key| {
        parse_numeric_id(key)
            .map(|_| key.to_string())
            .ok_or_else(|| "expected a numeric collection id".to_string())
    })
    .map(ItemDataV2)
}

fn parse_v3(raw: &Value, assignments: &SchemaRegistry) -> Result<ItemSyllabusData, SchemaErrors> {
    parse_lists(raw, assignments, |key| {
        key.parse::<CollectionRef>().map_err(|e| e.to_string())
    })
    .map(|entries| ItemSyllabusData { entries })
}

fn upgrade_v1(prior: ItemDataV1) -> Value {
    let mut upgraded = Map::new();
    for (key, draft) in prior.0 {
        if !draft.is_meaningful() {
            tracing::debug!("Dropping empty legacy assignment for collection {}", key);
            continue;
        }
        if let Ok(value) = serde_json::to_value(&draft) {
            upgraded.insert(key, Value::Array(vec![value]));
        }
    }
    Value::Object(upgraded)
}

fn upgrade_v2(prior: ItemDataV2, resolver: &dyn CollectionResolver) -> Value {
    let mut by_id: Vec<(u64, Vec<Assignment>)> = prior
        .0
        .into_iter()
        .filter_map(|(key, list)| parse_numeric_id(&key).map(|id| (id, list)))
        .collect();
    by_id.sort_by_key(|(id, _)| *id);

    let mut upgraded: BTreeMap<CollectionRef, Vec<Assignment>> = BTreeMap::new();
    for (id, list) in by_id {
        match resolver.resolve_collection(id) {
            Some(collection) => upgraded.entry(collection).or_default().extend(list),
            None => tracing::debug!(
                "Dropping {} assignment(s) for missing collection {}",
                list.len(),
                id
            ),
        }
    }
    serde_json::to_value(ItemSyllabusData { entries: upgraded }).unwrap_or(Value::Null)
}

/// Schema registry for item syllabus data. Nested assignments are migrated
/// with `assignments`.
pub fn registry(assignments: Arc<SchemaRegistry>) -> Result<SchemaRegistry, RegistryError> {
    let for_v2 = Arc::clone(&assignments);
    let for_v3 = assignments;

    let mut versions = BTreeMap::new();
    versions.insert(1, VersionSpec::root(validator(parse_v1)));
    versions.insert(
        2,
        VersionSpec::upgraded(
            validator(move |raw| parse_v2(raw, &for_v2)),
            upgrader(|prior: ItemDataV1, _| upgrade_v1(prior)),
        ),
    );
    versions.insert(
        3,
        VersionSpec::upgraded(
            validator(move |raw| parse_v3(raw, &for_v3)),
            upgrader(upgrade_v2),
        ),
    );
    SchemaRegistry::register(EntityKind::ItemSyllabusData, LATEST_VERSION, detect, versions)
}
