//! Detect, validate, and upgrade blobs to their latest shape.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EntityKind, RegistryInfo, SchemaErrors, SchemaRegistry};
use crate::collection::CollectionResolver;
use crate::entities::{assignment, collection_meta, item_data};
use crate::error::{MigrationError, RegistryError};

/// An upgraded value failed validation at its target version.
///
/// The migration still completes with the raw upgraded value; the warning
/// exists so that the imperfection is observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepWarning {
    pub entity: EntityKind,
    pub from_version: u32,
    pub to_version: u32,
    pub errors: SchemaErrors,
}

impl fmt::Display for StepWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} upgrade v{} -> v{} produced invalid data: {}",
            self.entity, self.from_version, self.to_version, self.errors
        )
    }
}

/// A blob at its entity's latest version.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub value: Value,
    /// Version the blob was detected as before migrating
    pub source_version: u32,
    pub warnings: Vec<StepWarning>,
}

impl Migrated {
    /// True when no upgrade step ran.
    pub fn was_latest(&self, registry: &SchemaRegistry) -> bool {
        self.source_version == registry.latest()
    }
}

/// Migrate `raw` with a single registry.
///
/// Never writes anywhere; callers persist the result on their next write.
pub fn migrate_with(
    registry: &SchemaRegistry,
    raw: &Value,
    resolver: &dyn CollectionResolver,
) -> Result<Migrated, MigrationError> {
    let entity = registry.entity();
    let source_version = registry
        .detect(raw)
        .ok_or(MigrationError::MalformedInput { entity })?;
    let spec = registry
        .version(source_version)
        .ok_or_else(|| MigrationError::SchemaViolation {
            entity,
            version: source_version,
            errors: SchemaErrors::at("$", "detected version is not registered"),
        })?;

    let mut value = spec
        .validate(raw)
        .map_err(|errors| MigrationError::SchemaViolation {
            entity,
            version: source_version,
            errors,
        })?;

    let mut version = source_version;
    let mut warnings = Vec::new();
    while version < registry.latest() {
        let Some(next) = registry.version(version + 1) else {
            break;
        };
        let candidate = next.upgrade(value, resolver);
        value = match next.validate(&candidate) {
            Ok(valid) => valid,
            Err(errors) => {
                let warning = StepWarning {
                    entity,
                    from_version: version,
                    to_version: version + 1,
                    errors,
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
                candidate
            }
        };
        version += 1;
    }

    if source_version < registry.latest() {
        tracing::debug!(
            "Migrated {} from v{} to v{}",
            entity,
            source_version,
            registry.latest()
        );
    }

    Ok(Migrated {
        value,
        source_version,
        warnings,
    })
}

/// The installed registries, one per entity.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    registries: HashMap<EntityKind, Arc<SchemaRegistry>>,
}

impl Migrator {
    /// An empty migrator with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A migrator with every syllabus entity registered.
    pub fn standard() -> Result<Self, RegistryError> {
        let assignments = Arc::new(assignment::registry()?);
        let items = item_data::registry(Arc::clone(&assignments))?;
        let collections = collection_meta::registry()?;

        let mut migrator = Self::new();
        migrator.install(assignments);
        migrator.install(Arc::new(items));
        migrator.install(Arc::new(collections));
        Ok(migrator)
    }

    /// Install a registry, replacing any previous one for the same entity.
    pub fn install(&mut self, registry: Arc<SchemaRegistry>) {
        self.registries.insert(registry.entity(), registry);
    }

    pub fn registry(&self, entity: EntityKind) -> Result<&SchemaRegistry, MigrationError> {
        self.registries
            .get(&entity)
            .map(|r| r.as_ref())
            .ok_or(MigrationError::UnregisteredEntity(entity))
    }

    pub fn registries(&self) -> Vec<RegistryInfo> {
        let mut infos: Vec<RegistryInfo> = self
            .registries
            .values()
            .map(|r| RegistryInfo::from(r.as_ref()))
            .collect();
        infos.sort_by_key(|info| info.entity);
        infos
    }

    /// Detect the version of `raw` without validating it.
    pub fn detect(&self, entity: EntityKind, raw: &Value) -> Result<Option<u32>, MigrationError> {
        Ok(self.registry(entity)?.detect(raw))
    }

    /// Bring `raw` to the latest version of `entity`.
    pub fn migrate(
        &self,
        entity: EntityKind,
        raw: &Value,
        resolver: &dyn CollectionResolver,
    ) -> Result<Migrated, MigrationError> {
        migrate_with(self.registry(entity)?, raw, resolver)
    }
}
