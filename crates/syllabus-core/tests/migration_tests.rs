//! Migration integration tests
//!
//! Stored blobs from every historical shape, run through the standard migrator.
//! Enhanced with property-based testing

mod common;

use std::collections::BTreeMap;

use common::fixtures::{library_collections, load_json_fixture};
use proptest::prelude::*;
use rstest::rstest;
use serde_json::{json, Value};
use syllabus_core::{
    CollectionDictionary, CollectionRef, EntityKind, ItemSyllabusData, MigrationError, Migrator,
    NoCollections,
};

fn migrator() -> Migrator {
    Migrator::standard().unwrap()
}

fn latest(entity: EntityKind) -> u32 {
    migrator().registry(entity).unwrap().latest()
}

// === Version Detection ===

#[rstest]
#[case(EntityKind::Assignment, json!({"classNumber": 1}), 1)]
#[case(EntityKind::Assignment, json!({"id": null, "priority": "optional"}), 1)]
#[case(EntityKind::Assignment, json!({"id": "x", "classNumber": 1}), 2)]
#[case(EntityKind::ItemSyllabusData, json!({"10": {"classNumber": 1}}), 1)]
#[case(EntityKind::ItemSyllabusData, json!({"10": [{"classNumber": 1}]}), 2)]
#[case(EntityKind::ItemSyllabusData, json!({"1:ABCD1234": []}), 3)]
#[case(EntityKind::ItemSyllabusData, json!({}), 3)]
#[case(EntityKind::ItemSyllabusData, json!({"10": [], "1:ABCD1234": {"classNumber": 2}}), 1)]
#[case(EntityKind::CollectionMetadata, json!({"10": {"description": "x"}}), 1)]
#[case(EntityKind::CollectionMetadata, json!({"1:ABCD1234": {}}), 2)]
#[case(EntityKind::CollectionMetadata, json!({}), 2)]
fn test_detect_version(#[case] entity: EntityKind, #[case] raw: Value, #[case] expected: u32) {
    assert_eq!(
        migrator().detect(entity, &raw).unwrap(),
        Some(expected),
        "{}: {}",
        entity,
        raw
    );
}

#[rstest]
#[case(EntityKind::Assignment, json!("text"))]
#[case(EntityKind::ItemSyllabusData, json!([1, 2]))]
#[case(EntityKind::CollectionMetadata, json!(null))]
fn test_non_object_blob_is_malformed(#[case] entity: EntityKind, #[case] raw: Value) {
    let err = migrator()
        .migrate(entity, &raw, &NoCollections)
        .unwrap_err();
    assert_eq!(err, MigrationError::MalformedInput { entity });
}

#[test]
fn test_latest_versions() {
    assert_eq!(latest(EntityKind::Assignment), 2);
    assert_eq!(latest(EntityKind::ItemSyllabusData), 3);
    assert_eq!(latest(EntityKind::CollectionMetadata), 2);
}

// === End-to-End Scenarios ===

#[test]
fn test_legacy_item_data_reaches_durable_keys() {
    let mut resolver = BTreeMap::new();
    resolver.insert(10, CollectionRef::new(1, "ABCD1234"));
    let raw = json!({"10": {"classNumber": 1, "priority": "essential"}});

    let migrated = migrator()
        .migrate(EntityKind::ItemSyllabusData, &raw, &resolver)
        .unwrap();
    assert_eq!(migrated.source_version, 1);
    assert!(migrated.warnings.is_empty());

    let list = migrated.value["1:ABCD1234"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    let id = list[0]["id"].as_str().unwrap();
    assert!(!id.is_empty());
    assert_eq!(
        migrated.value,
        json!({"1:ABCD1234": [{"id": id, "classNumber": 1, "priority": "essential"}]})
    );
}

#[test]
fn test_item_data_v1_fixture() {
    let raw = load_json_fixture("item_data/v1.json");
    let migrated = migrator()
        .migrate(EntityKind::ItemSyllabusData, &raw, &library_collections())
        .unwrap();
    let data: ItemSyllabusData = serde_json::from_value(migrated.value).unwrap();

    let core = CollectionRef::new(1, "ABCD1234");
    let other = CollectionRef::new(1, "EFGH5678");
    // 12 held only a status and 99 no longer exists
    assert_eq!(data.collections().count(), 2);
    assert_eq!(data.assignments(&core)[0].class_number, Some(1));
    assert_eq!(
        data.assignments(&other)[0].class_instruction.as_deref(),
        Some("Skim")
    );
}

#[test]
fn test_item_data_v2_fixture() {
    let raw = load_json_fixture("item_data/v2.json");
    let migrated = migrator()
        .migrate(EntityKind::ItemSyllabusData, &raw, &library_collections())
        .unwrap();
    assert_eq!(migrated.source_version, 2);
    let data: ItemSyllabusData = serde_json::from_value(migrated.value).unwrap();

    let core = data.assignments(&CollectionRef::new(1, "ABCD1234"));
    assert_eq!(core.len(), 2);
    assert_eq!(core[0].id, "a1");
    assert_eq!(core[1].class_number, Some(2));
    assert!(!core[1].id.is_empty());
    assert!(data
        .assignments(&CollectionRef::new(1, "EFGH5678"))
        .is_empty());
}

#[test]
fn test_collection_metadata_v1_fixture() {
    let raw = load_json_fixture("collection_metadata/v1.json");
    let migrated = migrator()
        .migrate(EntityKind::CollectionMetadata, &raw, &library_collections())
        .unwrap();
    let dictionary: CollectionDictionary = serde_json::from_value(migrated.value).unwrap();

    assert_eq!(dictionary.iter().count(), 1);
    let metadata = dictionary.get(&CollectionRef::new(1, "ABCD1234")).unwrap();
    assert_eq!(
        metadata.description.as_deref(),
        Some("Foundations of astrophysics")
    );
    assert_eq!(metadata.nomenclature.as_deref(), Some("week"));
    assert_eq!(metadata.classes.len(), 1);
    assert_eq!(metadata.classes[&1].title.as_deref(), Some("Stars"));
}

// === Lossy Migrations ===

#[test]
fn test_empty_legacy_assignment_is_pruned() {
    let mut resolver = BTreeMap::new();
    resolver.insert(42, CollectionRef::new(1, "ABCD1234"));
    let migrated = migrator()
        .migrate(EntityKind::ItemSyllabusData, &json!({"42": {}}), &resolver)
        .unwrap();
    assert_eq!(migrated.value, json!({}));
}

#[test]
fn test_orphaned_collection_is_dropped() {
    let raw = json!({"7": [{"id": "x", "classNumber": 1}]});
    let migrated = migrator()
        .migrate(EntityKind::ItemSyllabusData, &raw, &NoCollections)
        .unwrap();
    assert_eq!(migrated.value, json!({}));
}

#[test]
fn test_null_classes_and_empty_order_are_stripped() {
    let raw = json!({
        "1:ABCD1234": {
            "classes": {"1": null, "2": {"title": "X", "itemOrder": []}}
        }
    });
    let migrated = migrator()
        .migrate(EntityKind::CollectionMetadata, &raw, &NoCollections)
        .unwrap();
    assert_eq!(migrated.source_version, 2);
    assert_eq!(
        migrated.value,
        json!({"1:ABCD1234": {"classes": {"2": {"title": "X"}}}})
    );
}

// === Stability ===

#[test]
fn test_assignment_id_is_stable() {
    let raw = load_json_fixture("assignment/v1.json");
    let first = migrator()
        .migrate(EntityKind::Assignment, &raw, &NoCollections)
        .unwrap();
    let id = first.value["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let second = migrator()
        .migrate(EntityKind::Assignment, &first.value, &NoCollections)
        .unwrap();
    assert_eq!(second.source_version, 2);
    assert_eq!(second.value["id"], json!(id));
    assert_eq!(second.value, first.value);
}

#[rstest]
#[case(EntityKind::ItemSyllabusData, "item_data/v3.json")]
#[case(EntityKind::CollectionMetadata, "collection_metadata/v2.json")]
fn test_latest_fixture_is_unchanged(#[case] entity: EntityKind, #[case] fixture: &str) {
    let raw = load_json_fixture(fixture);
    let migrated = migrator()
        .migrate(entity, &raw, &library_collections())
        .unwrap();
    assert_eq!(migrated.source_version, latest(entity));
    assert_eq!(migrated.value, raw);
}

// === Violations ===

#[rstest]
#[case(EntityKind::Assignment, json!({"id": "x", "classNumber": 0}), "classNumber")]
#[case(EntityKind::Assignment, json!({"classNumber": 0, "priority": "essential"}), "classNumber")]
#[case(EntityKind::ItemSyllabusData, json!({"1:ABCD1234": [{"id": "x", "classNumber": 0}]}), "1:ABCD1234[0].classNumber")]
#[case(EntityKind::CollectionMetadata, json!({"1:ABCD1234": {"priorities": [{"id": "a", "name": "A", "color": "#fff", "order": 0}]}}), "1:ABCD1234.priorities[0].color")]
fn test_violation_names_field(
    #[case] entity: EntityKind,
    #[case] raw: Value,
    #[case] path: &str,
) {
    match migrator().migrate(entity, &raw, &NoCollections) {
        Err(MigrationError::SchemaViolation { errors, .. }) => {
            assert!(
                errors.iter().any(|e| e.path.contains(path)),
                "expected an error at {}, got {}",
                path,
                errors
            );
        }
        other => panic!("expected a schema violation, got {:?}", other),
    }
}

// === Property-Based Tests ===

fn priority_name() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("course-info")),
        Just(Some("essential")),
        Just(Some("recommended")),
        Just(Some("optional")),
    ]
}

fn legacy_assignment() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(1u32..40),
        priority_name(),
        proptest::option::of("[a-z ]{0,12}"),
    )
        .prop_map(|(class, priority, instruction)| {
            let mut obj = serde_json::Map::new();
            if let Some(class) = class {
                obj.insert("classNumber".into(), json!(class));
            }
            if let Some(priority) = priority {
                obj.insert("priority".into(), json!(priority));
            }
            if let Some(instruction) = instruction {
                obj.insert("classInstruction".into(), json!(instruction));
            }
            Value::Object(obj)
        })
}

fn resolver_for(ids: impl IntoIterator<Item = u64>) -> BTreeMap<u64, CollectionRef> {
    ids.into_iter()
        .filter(|id| id % 3 != 0)
        .map(|id| (id, CollectionRef::new(1, format!("KEY{}", id % 5))))
        .collect()
}

proptest! {
    #[test]
    fn test_assignment_migration_is_idempotent(raw in legacy_assignment()) {
        let m = migrator();
        let once = m.migrate(EntityKind::Assignment, &raw, &NoCollections).unwrap();
        prop_assert_eq!(m.detect(EntityKind::Assignment, &once.value).unwrap(), Some(2));
        let twice = m.migrate(EntityKind::Assignment, &once.value, &NoCollections).unwrap();
        prop_assert_eq!(twice.value, once.value);
    }

    #[test]
    fn test_item_data_upgrade_is_monotonic(
        entries in proptest::collection::btree_map(1u64..30, legacy_assignment(), 0..6)
    ) {
        let raw: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(id, a)| (id.to_string(), a.clone()))
            .collect();
        let raw = Value::Object(raw);
        let resolver = resolver_for(entries.keys().copied());

        let m = migrator();
        let once = m.migrate(EntityKind::ItemSyllabusData, &raw, &resolver).unwrap();
        prop_assert_eq!(m.detect(EntityKind::ItemSyllabusData, &once.value).unwrap(), Some(3));

        let twice = m.migrate(EntityKind::ItemSyllabusData, &once.value, &resolver).unwrap();
        prop_assert_eq!(twice.source_version, 3);
        prop_assert_eq!(twice.value, once.value);
    }

    #[test]
    fn test_collection_metadata_upgrade_is_monotonic(
        entries in proptest::collection::btree_map(1u64..30, "[A-Za-z ]{0,16}", 0..6)
    ) {
        let raw: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(id, d)| (id.to_string(), json!({"description": d, "locked": id % 2 == 0})))
            .collect();
        let raw = Value::Object(raw);
        let resolver = resolver_for(entries.keys().copied());

        let m = migrator();
        let once = m.migrate(EntityKind::CollectionMetadata, &raw, &resolver).unwrap();
        prop_assert_eq!(m.detect(EntityKind::CollectionMetadata, &once.value).unwrap(), Some(2));

        let twice = m.migrate(EntityKind::CollectionMetadata, &once.value, &resolver).unwrap();
        prop_assert_eq!(twice.value, once.value);
    }
}
