//! Typed access to syllabus data.
//!
//! Reads go through the migrator and never write back; the latest shape is
//! stored the next time the caller changes something.
//!
//! Item data and the collection dictionary are maps keyed by collection.
//! When a stored map does not migrate as a whole, it is read again entry by
//! entry and the entries that still fail are set aside. Writes keep those
//! entries verbatim, or refuse to run when they cannot be kept, so one
//! corrupted entry never hides or destroys the others.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::map::Entry;
use serde_json::{Map, Value};

use crate::collection::{parse_numeric_id, CollectionRef, CollectionResolver};
use crate::config::SyllabusConfig;
use crate::entities::collection_meta::parse_reading_date;
use crate::entities::{
    Assignment, AssignmentDraft, ClassMetadata, ClassStatus, CollectionDictionary,
    CollectionMetadata, ItemSyllabusData,
};
use crate::error::{Result, SyllabusError};
use crate::priority::{is_valid_color, PriorityDefinition, PrioritySet};
use crate::schedule::ReadingSchedule;
use crate::schema::{EntityKind, Migrated, Migrator, SchemaErrors};
use crate::storage::{ExtraField, ItemFieldStore, PreferenceStore};

/// A stored map at its latest shape, plus the raw entries that could not
/// be read.
#[derive(Debug, Default)]
struct Stored<T> {
    data: T,
    rejected: Map<String, Value>,
}

/// Syllabus data for one library, backed by host storage.
pub struct Syllabus<P, F, R> {
    prefs: P,
    fields: F,
    resolver: R,
    migrator: Migrator,
    config: SyllabusConfig,
}

impl<P, F, R> Syllabus<P, F, R>
where
    P: PreferenceStore,
    F: ItemFieldStore,
    R: CollectionResolver,
{
    pub fn new(prefs: P, fields: F, resolver: R) -> Result<Self> {
        Self::with_config(prefs, fields, resolver, SyllabusConfig::default())
    }

    pub fn with_config(prefs: P, fields: F, resolver: R, config: SyllabusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            prefs,
            fields,
            resolver,
            migrator: Migrator::standard()?,
            config,
        })
    }

    pub fn config(&self) -> &SyllabusConfig {
        &self.config
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Migrate `raw` and check that it decodes as `T`. Step warnings count
    /// as failures.
    fn migrate_checked<T>(
        &self,
        entity: EntityKind,
        raw: &Value,
    ) -> std::result::Result<Migrated, String>
    where
        T: DeserializeOwned,
    {
        let migrated = self
            .migrator
            .migrate(entity, raw, &self.resolver)
            .map_err(|e| e.to_string())?;
        if let Some(warning) = migrated.warnings.first() {
            return Err(warning.to_string());
        }
        serde_json::from_value::<T>(migrated.value.clone()).map_err(|e| e.to_string())?;
        Ok(migrated)
    }

    /// Read a stored map, salvaging entry by entry when it does not migrate
    /// as a whole.
    fn load<T>(&self, entity: EntityKind, location: &str, text: Option<&str>) -> Stored<T>
    where
        T: DeserializeOwned + Default,
    {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return Stored::default();
        };
        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Ignoring unparseable {} for {}: {}", entity, location, err);
                return Stored::default();
            }
        };

        let message = match self.migrate_checked::<T>(entity, &raw) {
            Ok(migrated) => {
                if migrated.source_version != self.latest_version(entity) {
                    tracing::debug!(
                        "Read {} for {} at v{}; latest shape is stored on next write",
                        entity,
                        location,
                        migrated.source_version
                    );
                }
                return Stored {
                    data: serde_json::from_value(migrated.value).unwrap_or_default(),
                    rejected: Map::new(),
                };
            }
            Err(message) => message,
        };
        let Some(entries) = raw.as_object() else {
            tracing::warn!("Ignoring {} for {}: {}", entity, location, message);
            return Stored::default();
        };
        tracing::warn!("Reading {} for {} entry by entry: {}", entity, location, message);

        // Ascending numeric ids, so merges match a whole-map migration
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort_by(|a, b| {
            let rank = |k: &str| parse_numeric_id(k).unwrap_or(u64::MAX);
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        });

        let mut merged = Map::new();
        let mut rejected = Map::new();
        for key in keys {
            let entry = &entries[key.as_str()];
            let single: Map<String, Value> =
                std::iter::once((key.clone(), entry.clone())).collect();
            match self.migrate_checked::<T>(entity, &Value::Object(single)) {
                Ok(migrated) => merge_entries(&mut merged, migrated.value),
                Err(message) => {
                    tracing::warn!(
                        "Skipping {} entry {} for {}: {}",
                        entity,
                        key,
                        location,
                        message
                    );
                    rejected.insert(key.clone(), entry.clone());
                }
            }
        }
        let data = serde_json::from_value(Value::Object(merged)).unwrap_or_else(|err| {
            tracing::warn!("Ignoring salvaged {} for {}: {}", entity, location, err);
            T::default()
        });
        Stored { data, rejected }
    }

    /// Serialize `data` for storage, keeping the rejected entries of other
    /// collections verbatim.
    fn encode<T: Serialize>(
        &self,
        entity: EntityKind,
        location: &str,
        editing: &CollectionRef,
        data: &T,
        rejected: &Map<String, Value>,
    ) -> Result<Value> {
        let value = serde_json::to_value(data)?;
        if rejected.is_empty() {
            return Ok(value);
        }
        let Value::Object(mut map) = value else {
            return Ok(value);
        };
        for (key, raw) in rejected {
            let keepable = match key.parse::<CollectionRef>() {
                Ok(collection) => &collection != editing && !map.contains_key(key),
                Err(_) => false,
            };
            if !keepable {
                return Err(SyllabusError::UnreadableEntry {
                    entity,
                    location: location.to_string(),
                    key: key.clone(),
                });
            }
            map.insert(key.clone(), raw.clone());
        }
        Ok(Value::Object(map))
    }

    fn latest_version(&self, entity: EntityKind) -> u32 {
        self.migrator
            .registry(entity)
            .map(|r| r.latest())
            .unwrap_or_default()
    }

    // ===== Item data =====

    fn read_item(&self, item: &str) -> Result<(ExtraField, Stored<ItemSyllabusData>)> {
        let extra = ExtraField::parse(&self.fields.extra(item)?.unwrap_or_default());
        let stored = self.load(
            EntityKind::ItemSyllabusData,
            item,
            extra.get(&self.config.extra_field),
        );
        Ok((extra, stored))
    }

    fn write_item(
        &self,
        item: &str,
        collection: &CollectionRef,
        mut extra: ExtraField,
        stored: &Stored<ItemSyllabusData>,
    ) -> Result<()> {
        let value = self.encode(
            EntityKind::ItemSyllabusData,
            item,
            collection,
            &stored.data,
            &stored.rejected,
        )?;
        if value.as_object().map_or(false, Map::is_empty) {
            extra.remove(&self.config.extra_field);
        } else {
            extra.set(&self.config.extra_field, &value.to_string());
        }
        self.fields.set_extra(item, &extra.to_string())?;
        tracing::debug!("Saved syllabus data for item {}", item);
        Ok(())
    }

    /// Every assignment of `item`, across collections.
    pub fn all_assignments(&self, item: &str) -> Result<ItemSyllabusData> {
        Ok(self.read_item(item)?.1.data)
    }

    /// Assignments of `item` in `collection`.
    pub fn assignments(&self, item: &str, collection: &CollectionRef) -> Result<Vec<Assignment>> {
        Ok(self.read_item(item)?.1.data.assignments(collection).to_vec())
    }

    /// Place `item` into `collection` with a new assignment.
    pub fn add_assignment(
        &self,
        item: &str,
        collection: &CollectionRef,
        draft: AssignmentDraft,
    ) -> Result<Assignment> {
        check_draft(&draft)?;
        let (extra, mut stored) = self.read_item(item)?;
        let assignment = Assignment::new(draft);
        stored.data.push(collection.clone(), assignment.clone());
        self.write_item(item, collection, extra, &stored)?;
        Ok(assignment)
    }

    /// Edit the fields of an existing assignment. The id never changes.
    pub fn update_assignment(
        &self,
        item: &str,
        collection: &CollectionRef,
        id: &str,
        edit: impl FnOnce(&mut AssignmentDraft),
    ) -> Result<Assignment> {
        let (extra, mut stored) = self.read_item(item)?;
        let assignment = stored
            .data
            .find_mut(collection, id)
            .ok_or_else(|| SyllabusError::AssignmentNotFound {
                item: item.to_string(),
                collection: collection.clone(),
                id: id.to_string(),
            })?;
        let mut draft = assignment.draft();
        edit(&mut draft);
        check_draft(&draft)?;
        assignment.class_number = draft.class_number;
        assignment.priority = draft.priority;
        assignment.class_instruction = draft.class_instruction;
        assignment.status = draft.status;
        let updated = assignment.clone();
        self.write_item(item, collection, extra, &stored)?;
        Ok(updated)
    }

    /// Remove one assignment. Returns whether it existed.
    pub fn remove_assignment(
        &self,
        item: &str,
        collection: &CollectionRef,
        id: &str,
    ) -> Result<bool> {
        let (extra, mut stored) = self.read_item(item)?;
        if stored.data.remove(collection, id).is_none() {
            return Ok(false);
        }
        self.write_item(item, collection, extra, &stored)?;
        Ok(true)
    }

    /// Remove every assignment of `item` in `collection`. Returns how many
    /// were removed.
    pub fn clear_collection(&self, item: &str, collection: &CollectionRef) -> Result<usize> {
        let (extra, mut stored) = self.read_item(item)?;
        let removed = stored.data.clear_collection(collection).len();
        if removed > 0 {
            self.write_item(item, collection, extra, &stored)?;
        }
        Ok(removed)
    }

    // ===== Collection metadata =====

    fn read_dictionary(&self) -> Result<Stored<CollectionDictionary>> {
        let key = &self.config.collection_metadata_key;
        let text = self.prefs.get(key)?;
        Ok(self.load(EntityKind::CollectionMetadata, key, text.as_deref()))
    }

    /// The whole collection metadata dictionary.
    pub fn collection_dictionary(&self) -> Result<CollectionDictionary> {
        Ok(self.read_dictionary()?.data)
    }

    /// Metadata for `collection`, empty when none was ever set.
    pub fn collection_metadata(&self, collection: &CollectionRef) -> Result<CollectionMetadata> {
        Ok(self
            .collection_dictionary()?
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    /// Edit a collection's metadata and store the dictionary. Nothing is
    /// written when the edited metadata is invalid.
    pub fn update_collection<T>(
        &self,
        collection: &CollectionRef,
        edit: impl FnOnce(&mut CollectionMetadata) -> T,
    ) -> Result<T> {
        let mut stored = self.read_dictionary()?;
        let metadata = stored.data.entry(collection.clone());
        let result = edit(metadata);
        let errors = metadata.validate();
        if !errors.is_empty() {
            return Err(SyllabusError::InvalidMetadata(errors));
        }
        let key = &self.config.collection_metadata_key;
        let value = self.encode(
            EntityKind::CollectionMetadata,
            key,
            collection,
            &stored.data,
            &stored.rejected,
        )?;
        self.prefs.set(key, &value.to_string())?;
        tracing::info!("Saved syllabus metadata for collection {}", collection);
        Ok(result)
    }

    pub fn description(&self, collection: &CollectionRef) -> Result<Option<String>> {
        Ok(self.collection_metadata(collection)?.description)
    }

    pub fn set_description(
        &self,
        collection: &CollectionRef,
        description: Option<String>,
    ) -> Result<()> {
        self.update_collection(collection, |m| m.description = non_blank(description))
    }

    /// Display noun for a class, falling back to the configured default.
    pub fn nomenclature(&self, collection: &CollectionRef) -> Result<String> {
        Ok(self
            .collection_metadata(collection)?
            .nomenclature
            .unwrap_or_else(|| self.config.default_nomenclature.clone()))
    }

    pub fn set_nomenclature(
        &self,
        collection: &CollectionRef,
        nomenclature: Option<String>,
    ) -> Result<()> {
        self.update_collection(collection, |m| m.nomenclature = non_blank(nomenclature))
    }

    pub fn priorities(&self, collection: &CollectionRef) -> Result<PrioritySet> {
        let metadata = self.collection_metadata(collection)?;
        Ok(PrioritySet::new(metadata.priorities.as_deref()))
    }

    /// Replace the custom priorities; an empty list restores the defaults.
    pub fn set_priorities(
        &self,
        collection: &CollectionRef,
        priorities: Vec<PriorityDefinition>,
    ) -> Result<()> {
        if let Some(bad) = priorities.iter().find(|p| !is_valid_color(&p.color)) {
            return Err(SyllabusError::InvalidColor(bad.color.clone()));
        }
        let priorities = (!priorities.is_empty()).then_some(priorities);
        self.update_collection(collection, |m| m.priorities = priorities)
    }

    pub fn is_locked(&self, collection: &CollectionRef) -> Result<bool> {
        Ok(self.collection_metadata(collection)?.locked.unwrap_or(false))
    }

    pub fn set_locked(&self, collection: &CollectionRef, locked: bool) -> Result<()> {
        self.update_collection(collection, |m| m.locked = Some(locked))
    }

    pub fn class_metadata(
        &self,
        collection: &CollectionRef,
        class: u32,
    ) -> Result<Option<ClassMetadata>> {
        Ok(self.collection_metadata(collection)?.classes.remove(&class))
    }

    pub fn class_title(&self, collection: &CollectionRef, class: u32) -> Result<Option<String>> {
        Ok(self.class_metadata(collection, class)?.and_then(|c| c.title))
    }

    fn update_class(
        &self,
        collection: &CollectionRef,
        class: u32,
        edit: impl FnOnce(&mut ClassMetadata),
    ) -> Result<()> {
        if class == 0 {
            return Err(SyllabusError::InvalidClassNumber(class));
        }
        self.update_collection(collection, |m| edit(m.classes.entry(class).or_default()))
    }

    pub fn set_class_title(
        &self,
        collection: &CollectionRef,
        class: u32,
        title: Option<String>,
    ) -> Result<()> {
        self.update_class(collection, class, |c| c.title = non_blank(title))
    }

    pub fn set_class_description(
        &self,
        collection: &CollectionRef,
        class: u32,
        description: Option<String>,
    ) -> Result<()> {
        self.update_class(collection, class, |c| c.description = non_blank(description))
    }

    pub fn set_reading_date(
        &self,
        collection: &CollectionRef,
        class: u32,
        date: Option<&str>,
    ) -> Result<()> {
        if let Some(date) = date {
            if parse_reading_date(date).is_none() {
                return Err(SyllabusError::InvalidReadingDate(date.to_string()));
            }
        }
        let date = date.map(str::to_string);
        self.update_class(collection, class, |c| c.reading_date = date)
    }

    pub fn set_class_status(
        &self,
        collection: &CollectionRef,
        class: u32,
        status: Option<ClassStatus>,
    ) -> Result<()> {
        self.update_class(collection, class, |c| c.status = status)
    }

    /// Set the manual item order of a class; an empty list clears it.
    pub fn set_item_order(
        &self,
        collection: &CollectionRef,
        class: u32,
        items: Vec<String>,
    ) -> Result<()> {
        let order = (!items.is_empty()).then_some(items);
        self.update_class(collection, class, |c| c.item_order = order)
    }

    /// Delete a class's metadata. Returns whether it existed; nothing is
    /// written when it did not.
    pub fn remove_class(&self, collection: &CollectionRef, class: u32) -> Result<bool> {
        if self.class_metadata(collection, class)?.is_none() {
            return Ok(false);
        }
        self.update_collection(collection, |m| m.classes.remove(&class).is_some())
    }

    /// The reading schedule of `collection` over the given items.
    pub fn reading_schedule(
        &self,
        collection: &CollectionRef,
        items: &[&str],
    ) -> Result<ReadingSchedule> {
        let metadata = self.collection_metadata(collection)?;
        let nomenclature = metadata
            .nomenclature
            .clone()
            .unwrap_or_else(|| self.config.default_nomenclature.clone());
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            entries.push((*item, self.assignments(item, collection)?));
        }
        Ok(ReadingSchedule::build(&metadata, &nomenclature, entries))
    }
}

/// Add one migrated single-entry map into `merged`. Lists for the same key
/// are concatenated; otherwise the first entry wins.
fn merge_entries(merged: &mut Map<String, Value>, value: Value) {
    let Value::Object(entries) = value else {
        return;
    };
    for (key, value) in entries {
        match merged.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                if let (Value::Array(existing), Value::Array(more)) = (slot.get_mut(), value) {
                    existing.extend(more);
                }
            }
        }
    }
}

fn check_draft(draft: &AssignmentDraft) -> Result<()> {
    let mut errors = SchemaErrors::new();
    draft.check(&mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SyllabusError::InvalidClassNumber(
            draft.class_number.unwrap_or_default(),
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
