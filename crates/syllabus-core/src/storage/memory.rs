//! In-memory stores.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{ItemFieldStore, PreferenceStore};
use crate::error::StorageError;

fn poisoned<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Poisoned(err.to_string())
}

/// Preferences held in memory.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Item extra fields held in memory.
///
/// Items must be added before their field can be written, mirroring a host
/// that rejects writes to unknown items.
#[derive(Debug, Default)]
pub struct MemoryItemFields {
    items: RwLock<HashMap<String, Option<String>>>,
}

impl MemoryItemFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item with an optional extra field.
    pub fn add_item(&self, item: &str, extra: Option<&str>) -> Result<(), StorageError> {
        self.items
            .write()
            .map_err(poisoned)?
            .insert(item.to_string(), extra.map(str::to_string));
        Ok(())
    }
}

impl ItemFieldStore for MemoryItemFields {
    fn extra(&self, item: &str) -> Result<Option<String>, StorageError> {
        self.items
            .read()
            .map_err(poisoned)?
            .get(item)
            .cloned()
            .ok_or_else(|| StorageError::ItemNotFound(item.to_string()))
    }

    fn set_extra(&self, item: &str, extra: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(poisoned)?;
        let slot = items
            .get_mut(item)
            .ok_or_else(|| StorageError::ItemNotFound(item.to_string()))?;
        *slot = Some(extra.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.get("k").unwrap(), None);
        prefs.set("k", "v").unwrap();
        assert_eq!(prefs.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn unknown_items_are_rejected() {
        let fields = MemoryItemFields::new();
        assert!(matches!(
            fields.extra("ITEM1"),
            Err(StorageError::ItemNotFound(_))
        ));
        fields.add_item("ITEM1", None).unwrap();
        assert_eq!(fields.extra("ITEM1").unwrap(), None);
        fields.set_extra("ITEM1", "note").unwrap();
        assert_eq!(fields.extra("ITEM1").unwrap().as_deref(), Some("note"));
    }
}
