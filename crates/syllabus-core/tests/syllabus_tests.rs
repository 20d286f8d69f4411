//! Syllabus service integration tests
//!
//! Legacy data written by older releases, read and edited through the
//! typed accessors.

mod common;

use common::fixtures::{library_collections, load_json_fixture};
use serde_json::{json, Value};
use syllabus_core::{
    AssignmentDraft, CollectionRef, ExtraField, FilePreferences, ItemFieldStore, MemoryItemFields,
    MemoryPreferences, PreferenceStore, Priority, Syllabus, SyllabusConfig, SyllabusError,
};

const METADATA_KEY: &str = "extensions.syllabus.collectionMetadata";

fn core() -> CollectionRef {
    CollectionRef::new(1, "ABCD1234")
}

fn review() -> CollectionRef {
    CollectionRef::new(1, "EFGH5678")
}

fn legacy_extra() -> String {
    let blob = load_json_fixture("item_data/v1.json");
    format!("tex.note: imported\nsyllabus: {}", blob)
}

#[test]
fn test_reads_never_write_back() {
    let prefs = MemoryPreferences::new();
    let legacy = load_json_fixture("collection_metadata/v1.json").to_string();
    prefs.set(METADATA_KEY, &legacy).unwrap();
    let fields = MemoryItemFields::new();
    fields.add_item("ITEM1", Some(legacy_extra().as_str())).unwrap();

    let syllabus = Syllabus::new(&prefs, &fields, library_collections()).unwrap();
    assert_eq!(syllabus.nomenclature(&core()).unwrap(), "week");
    assert_eq!(syllabus.assignments("ITEM1", &core()).unwrap().len(), 1);
    assert_eq!(syllabus.reading_schedule(&core(), &["ITEM1"]).unwrap().reading_count(), 1);

    assert_eq!(prefs.get(METADATA_KEY).unwrap(), Some(legacy));
    assert_eq!(fields.extra("ITEM1").unwrap(), Some(legacy_extra()));
}

#[test]
fn test_edit_stores_latest_shape() {
    let fields = MemoryItemFields::new();
    fields.add_item("ITEM1", Some(legacy_extra().as_str())).unwrap();
    let syllabus =
        Syllabus::new(MemoryPreferences::new(), &fields, library_collections()).unwrap();

    let existing = syllabus.assignments("ITEM1", &core()).unwrap();
    assert_eq!(existing.len(), 1);
    let cleared = syllabus.clear_collection("ITEM1", &core()).unwrap();
    assert_eq!(cleared, 1);

    let extra = ExtraField::parse(&fields.extra("ITEM1").unwrap().unwrap());
    assert_eq!(extra.get("tex.note"), Some("imported"));
    let stored: Value = serde_json::from_str(extra.get("syllabus").unwrap()).unwrap();
    assert!(stored.get("1:ABCD1234").is_none());
    assert_eq!(stored["1:EFGH5678"][0]["classInstruction"], "Skim");
    assert!(stored.get("10").is_none());
}

#[test]
fn test_custom_extra_field_name() {
    let config = SyllabusConfig {
        extra_field: "course".to_string(),
        ..Default::default()
    };
    let fields = MemoryItemFields::new();
    fields.add_item("ITEM1", Some("syllabus: untouched")).unwrap();
    let syllabus = Syllabus::with_config(
        MemoryPreferences::new(),
        &fields,
        library_collections(),
        config,
    )
    .unwrap();

    let draft = AssignmentDraft {
        priority: Some(Priority::Recommended),
        ..Default::default()
    };
    syllabus.add_assignment("ITEM1", &core(), draft).unwrap();

    let extra = ExtraField::parse(&fields.extra("ITEM1").unwrap().unwrap());
    assert_eq!(extra.get("syllabus"), Some("untouched"));
    assert!(extra.get("course").unwrap().contains("recommended"));
}

#[test]
fn test_metadata_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    {
        let syllabus = Syllabus::new(
            FilePreferences::open(&path).unwrap(),
            MemoryItemFields::new(),
            library_collections(),
        )
        .unwrap();
        syllabus
            .set_description(&core(), Some("Stellar physics".to_string()))
            .unwrap();
        syllabus
            .set_reading_date(&core(), 1, Some("2024-09-02"))
            .unwrap();
    }

    let syllabus = Syllabus::new(
        FilePreferences::open(&path).unwrap(),
        MemoryItemFields::new(),
        library_collections(),
    )
    .unwrap();
    assert_eq!(
        syllabus.description(&core()).unwrap().as_deref(),
        Some("Stellar physics")
    );
    let class = syllabus.class_metadata(&core(), 1).unwrap().unwrap();
    assert_eq!(
        class.reading_day().map(|d| d.to_string()).as_deref(),
        Some("2024-09-02")
    );
}

#[test]
fn test_legacy_assignment_ids_are_stable() {
    let fields = MemoryItemFields::new();
    fields.add_item("ITEM1", Some(legacy_extra().as_str())).unwrap();
    let syllabus =
        Syllabus::new(MemoryPreferences::new(), &fields, library_collections()).unwrap();

    let first = syllabus.assignments("ITEM1", &core()).unwrap();
    let second = syllabus.assignments("ITEM1", &core()).unwrap();
    assert_eq!(first, second);
    let id = first[0].id.clone();

    let updated = syllabus
        .update_assignment("ITEM1", &core(), &id, |d| d.class_number = Some(6))
        .unwrap();
    assert_eq!(updated.id, id);
    assert_eq!(syllabus.assignments("ITEM1", &core()).unwrap()[0].id, id);
    assert!(syllabus.remove_assignment("ITEM1", &core(), &id).unwrap());
    assert!(syllabus.assignments("ITEM1", &core()).unwrap().is_empty());
}

#[test]
fn test_unreadable_metadata_entry_is_kept() {
    let prefs = MemoryPreferences::new();
    let stored = json!({
        "1:ABCD1234": {"description": "Keep me"},
        "1:EFGH5678": {"classes": {"3": {"readingDate": "next tuesday"}}}
    });
    prefs.set(METADATA_KEY, &stored.to_string()).unwrap();
    let syllabus = Syllabus::new(&prefs, MemoryItemFields::new(), library_collections()).unwrap();

    assert_eq!(
        syllabus.description(&core()).unwrap().as_deref(),
        Some("Keep me")
    );

    let third = CollectionRef::new(2, "ZZZZ9999");
    syllabus.set_locked(&third, true).unwrap();
    let written: Value = serde_json::from_str(&prefs.get(METADATA_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(written["1:ABCD1234"]["description"], "Keep me");
    assert_eq!(written["1:EFGH5678"], stored["1:EFGH5678"]);
    assert_eq!(written["2:ZZZZ9999"]["locked"], true);

    let before = prefs.get(METADATA_KEY).unwrap();
    let err = syllabus.set_locked(&review(), true).unwrap_err();
    assert!(matches!(err, SyllabusError::UnreadableEntry { .. }));
    assert_eq!(prefs.get(METADATA_KEY).unwrap(), before);
}

#[test]
fn test_unreadable_assignment_list_is_kept() {
    let blob = json!({
        "1:ABCD1234": [{"id": "kept", "classNumber": 1, "priority": "essential"}],
        "1:EFGH5678": [{"id": "broken", "priority": "urgent"}]
    });
    let fields = MemoryItemFields::new();
    fields
        .add_item("ITEM1", Some(format!("syllabus: {}", blob).as_str()))
        .unwrap();
    let syllabus =
        Syllabus::new(MemoryPreferences::new(), &fields, library_collections()).unwrap();

    let existing = syllabus.assignments("ITEM1", &core()).unwrap();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0].id, "kept");

    let draft = AssignmentDraft {
        class_number: Some(2),
        ..Default::default()
    };
    syllabus.add_assignment("ITEM1", &core(), draft).unwrap();

    let extra = ExtraField::parse(&fields.extra("ITEM1").unwrap().unwrap());
    let stored: Value = serde_json::from_str(extra.get("syllabus").unwrap()).unwrap();
    assert_eq!(stored["1:ABCD1234"].as_array().unwrap().len(), 2);
    assert_eq!(stored["1:EFGH5678"], blob["1:EFGH5678"]);
}
