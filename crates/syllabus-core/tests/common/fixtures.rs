//! Test fixture loading utilities

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use syllabus_core::CollectionRef;

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// Load a fixture file as parsed JSON
pub fn load_json_fixture(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", name));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Bad fixture {}: {}", name, e))
}

/// The library the fixtures were taken from: ids 10 and 11 are live,
/// 12 is a duplicate of 10 after a re-sync, anything else was deleted.
#[allow(dead_code)]
pub fn library_collections() -> BTreeMap<u64, CollectionRef> {
    let mut map = BTreeMap::new();
    map.insert(10, CollectionRef::new(1, "ABCD1234"));
    map.insert(11, CollectionRef::new(1, "EFGH5678"));
    map.insert(12, CollectionRef::new(1, "ABCD1234"));
    map
}
