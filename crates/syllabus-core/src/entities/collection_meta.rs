//! Collection metadata: syllabus-level settings for each collection.
//!
//! # Versions
//!
//! - 1: keyed by numeric collection id
//! - 2: keyed by `"<libraryId>:<collectionKey>"`
//!
//! Null class entries and empty `itemOrder` lists are stripped whenever the
//! dictionary is parsed, at every version.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::collection::{is_plain_integer, parse_numeric_id, CollectionRef, CollectionResolver};
use crate::error::RegistryError;
use crate::priority::PriorityDefinition;
use crate::schema::{upgrader, validator, EntityKind, SchemaErrors, SchemaRegistry, VersionSpec};

/// Latest collection metadata version
pub const LATEST_VERSION: u32 = 2;

/// Progress of a whole class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassStatus {
    Done,
}

/// Metadata for one class (session) of a syllabus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Manual ordering of item keys within the class
    #[serde(
        default,
        deserialize_with = "non_empty_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub item_order: Option<Vec<String>>,
    /// ISO-8601 date or date-time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ClassStatus>,
}

impl ClassMetadata {
    /// True when no field is set.
    pub fn is_blank(&self) -> bool {
        self == &Self::default()
    }

    /// The reading date as a calendar date.
    pub fn reading_day(&self) -> Option<NaiveDate> {
        self.reading_date.as_deref().and_then(parse_reading_date)
    }
}

/// Syllabus-level settings for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display noun for a class, e.g. "session" or "week"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nomenclature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorities: Option<Vec<PriorityDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_classes",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub classes: BTreeMap<u32, ClassMetadata>,
}

impl CollectionMetadata {
    /// Semantic checks beyond the serde shape.
    pub fn validate(&self) -> SchemaErrors {
        let mut errors = SchemaErrors::new();
        self.check("$", &mut errors);
        errors
    }

    fn check(&self, path: &str, errors: &mut SchemaErrors) {
        let nested = |field: &str| match path {
            "$" => field.to_string(),
            p => format!("{p}.{field}"),
        };
        for (i, def) in self.priorities.iter().flatten().enumerate() {
            def.check(&nested(&format!("priorities[{i}]")), errors);
        }
        for (number, class) in &self.classes {
            if *number == 0 {
                errors.push(nested("classes.0"), "class numbers start at 1");
            }
            if let Some(date) = &class.reading_date {
                if parse_reading_date(date).is_none() {
                    errors.push(
                        nested(&format!("classes.{number}.readingDate")),
                        format!("{date:?} is not an ISO-8601 date"),
                    );
                }
            }
        }
    }
}

/// Parse an ISO-8601 date (`2024-09-02`) or RFC 3339 date-time.
pub fn parse_reading_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn non_empty_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let list: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(list.filter(|l| !l.is_empty()))
}

fn present_classes<'de, D>(deserializer: D) -> Result<BTreeMap<u32, ClassMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let classes: Option<BTreeMap<u32, Option<ClassMetadata>>> = Option::deserialize(deserializer)?;
    Ok(classes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(number, class)| class.map(|c| (number, c)))
        .collect())
}

/// Every collection's metadata, keyed by durable reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionDictionary {
    entries: BTreeMap<CollectionRef, CollectionMetadata>,
}

impl CollectionDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, collection: &CollectionRef) -> Option<&CollectionMetadata> {
        self.entries.get(collection)
    }

    /// Metadata for `collection`, created empty on first use.
    pub fn entry(&mut self, collection: CollectionRef) -> &mut CollectionMetadata {
        self.entries.entry(collection).or_default()
    }

    pub fn insert(&mut self, collection: CollectionRef, metadata: CollectionMetadata) {
        self.entries.insert(collection, metadata);
    }

    pub fn remove(&mut self, collection: &CollectionRef) -> Option<CollectionMetadata> {
        self.entries.remove(collection)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CollectionRef, &CollectionMetadata)> {
        self.entries.iter()
    }
}

/// Version 1: numeric id → metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct DictionaryV1(BTreeMap<String, CollectionMetadata>);

/// v1 if any key has no colon and is an integer, else v2.
pub fn detect(raw: &Value) -> Option<u32> {
    let map = raw.as_object()?;
    if map.keys().any(|k| !k.contains(':') && is_plain_integer(k)) {
        Some(1)
    } else {
        Some(2)
    }
}

fn parse_entries<K, F>(
    raw: &Value,
    parse_key: F,
) -> Result<BTreeMap<K, CollectionMetadata>, SchemaErrors>
where
    K: Ord,
    F: Fn(&str) -> Result<K, String>,
{
    let map = raw
        .as_object()
        .ok_or_else(|| SchemaErrors::at("$", "expected an object"))?;
    let mut errors = SchemaErrors::new();
    let mut entries = BTreeMap::new();
    for (key, value) in map {
        let parsed_key = match parse_key(key) {
            Ok(k) => k,
            Err(message) => {
                errors.push(key.as_str(), message);
                continue;
            }
        };
        match CollectionMetadata::deserialize(value) {
            Ok(metadata) => {
                let nested = metadata.validate();
                if nested.is_empty() {
                    entries.insert(parsed_key, metadata);
                } else {
                    errors.extend_nested(key, nested);
                }
            }
            Err(err) => errors.extend_nested(key, err.into()),
        }
    }
    errors.into_result(entries)
}

fn parse_v1(raw: &Value) -> Result<DictionaryV1, SchemaErrors> {
    parse_entries(raw, |key| {
        parse_numeric_id(key)
            .map(|_| key.to_string())
            .ok_or_else(|| "expected a numeric collection id".to_string())
    })
    .map(DictionaryV1)
}

fn parse_v2(raw: &Value) -> Result<CollectionDictionary, SchemaErrors> {
    parse_entries(raw, |key| {
        key.parse::<CollectionRef>().map_err(|e| e.to_string())
    })
    .map(|entries| CollectionDictionary { entries })
}

/// Re-key by durable reference. Unresolvable collections are dropped; when
/// two ids resolve to the same collection the lower id wins.
fn upgrade_v1(prior: DictionaryV1, resolver: &dyn CollectionResolver) -> Value {
    let mut by_id: Vec<(u64, CollectionMetadata)> = prior
        .0
        .into_iter()
        .filter_map(|(key, metadata)| parse_numeric_id(&key).map(|id| (id, metadata)))
        .collect();
    by_id.sort_by_key(|(id, _)| *id);

    let mut upgraded = CollectionDictionary::new();
    for (id, metadata) in by_id {
        match resolver.resolve_collection(id) {
            Some(collection) if upgraded.get(&collection).is_some() => tracing::debug!(
                "Collection {} already has metadata; discarding entry for id {}",
                collection,
                id
            ),
            Some(collection) => upgraded.insert(collection, metadata),
            None => tracing::debug!("Dropping metadata for missing collection {}", id),
        }
    }
    serde_json::to_value(upgraded).unwrap_or(Value::Null)
}

/// Schema registry for the collection metadata dictionary.
pub fn registry() -> Result<SchemaRegistry, RegistryError> {
    let mut versions = BTreeMap::new();
    versions.insert(1, VersionSpec::root(validator(parse_v1)));
    versions.insert(
        2,
        VersionSpec::upgraded(validator(parse_v2), upgrader(upgrade_v1)),
    );
    SchemaRegistry::register(
        EntityKind::CollectionMetadata,
        LATEST_VERSION,
        detect,
        versions,
    )
}
