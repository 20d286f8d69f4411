//! Per-entity registries of versioned shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EntityKind, SchemaErrors};
use crate::collection::CollectionResolver;
use crate::error::RegistryError;

/// Validates a raw blob and returns its canonical form.
pub type Validator = Box<dyn Fn(&Value) -> Result<Value, SchemaErrors> + Send + Sync>;

/// Turns a validated value of the previous version into a raw candidate.
pub type Upgrader = Box<dyn Fn(Value, &dyn CollectionResolver) -> Value + Send + Sync>;

/// Classifies an unversioned blob, `None` when it is not an object.
pub type Detector = fn(&Value) -> Option<u32>;

/// One historical shape of an entity.
pub struct VersionSpec {
    validate: Validator,
    upgrade: Option<Upgrader>,
}

impl VersionSpec {
    /// The oldest shape, which nothing upgrades into.
    pub fn root(validate: Validator) -> Self {
        Self {
            validate,
            upgrade: None,
        }
    }

    /// A shape reached by upgrading the previous version.
    pub fn upgraded(validate: Validator, upgrade: Upgrader) -> Self {
        Self {
            validate,
            upgrade: Some(upgrade),
        }
    }

    pub fn validate(&self, raw: &Value) -> Result<Value, SchemaErrors> {
        (self.validate)(raw)
    }

    pub fn has_upgrade(&self) -> bool {
        self.upgrade.is_some()
    }

    /// Apply the upgrade into this version. The root version returns its
    /// input untouched.
    pub fn upgrade(&self, prior: Value, resolver: &dyn CollectionResolver) -> Value {
        match &self.upgrade {
            Some(upgrade) => upgrade(prior, resolver),
            None => prior,
        }
    }
}

impl fmt::Debug for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionSpec")
            .field("has_upgrade", &self.has_upgrade())
            .finish()
    }
}

/// Build a validator from a typed parser.
///
/// The parsed shape is re-serialized, so the canonical value drops unknown
/// keys and applies the shape's normalisation.
pub fn validator<T, F>(parse: F) -> Validator
where
    T: Serialize,
    F: Fn(&Value) -> Result<T, SchemaErrors> + Send + Sync + 'static,
{
    Box::new(move |raw| {
        let shape = parse(raw)?;
        serde_json::to_value(shape).map_err(SchemaErrors::from)
    })
}

/// Build an upgrader from a typed transform over the previous shape.
pub fn upgrader<P, F>(upgrade: F) -> Upgrader
where
    P: DeserializeOwned,
    F: Fn(P, &dyn CollectionResolver) -> Value + Send + Sync + 'static,
{
    Box::new(move |prior, resolver| match P::deserialize(&prior) {
        Ok(shape) => upgrade(shape, resolver),
        Err(err) => {
            // The previous step produced a best-effort value; pass it on
            // and let the next validation report it.
            tracing::warn!("Cannot read prior shape for upgrade: {}", err);
            prior
        }
    })
}

/// The ordered versions of one entity plus its detector.
pub struct SchemaRegistry {
    entity: EntityKind,
    latest: u32,
    detect: Detector,
    /// Index `i` holds version `i + 1`
    versions: Vec<VersionSpec>,
}

impl SchemaRegistry {
    /// Declare an entity's versions.
    ///
    /// `versions` must contain exactly `1..=latest`. Version 1 has no
    /// upgrade; every later version has one.
    pub fn register(
        entity: EntityKind,
        latest: u32,
        detect: Detector,
        mut versions: BTreeMap<u32, VersionSpec>,
    ) -> Result<Self, RegistryError> {
        if latest == 0 || versions.is_empty() {
            return Err(RegistryError::Empty { entity });
        }
        if let Some((&version, _)) = versions.range((latest + 1)..).next() {
            return Err(RegistryError::UnexpectedVersion {
                entity,
                version,
                latest,
            });
        }
        if versions.contains_key(&0) {
            return Err(RegistryError::UnexpectedVersion {
                entity,
                version: 0,
                latest,
            });
        }

        let mut ordered = Vec::with_capacity(latest as usize);
        for version in 1..=latest {
            let spec = versions
                .remove(&version)
                .ok_or(RegistryError::MissingVersion { entity, version })?;
            match (version, spec.has_upgrade()) {
                (1, true) => return Err(RegistryError::RootUpgrade { entity }),
                (v, false) if v > 1 => {
                    return Err(RegistryError::MissingUpgrade { entity, version })
                }
                _ => {}
            }
            ordered.push(spec);
        }

        Ok(Self {
            entity,
            latest,
            detect,
            versions: ordered,
        })
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn latest(&self) -> u32 {
        self.latest
    }

    pub fn detect(&self, raw: &Value) -> Option<u32> {
        (self.detect)(raw)
    }

    pub fn version(&self, version: u32) -> Option<&VersionSpec> {
        version
            .checked_sub(1)
            .and_then(|i| self.versions.get(i as usize))
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entity", &self.entity)
            .field("latest", &self.latest)
            .finish()
    }
}

/// Summary of a registry, for diagnostics and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub entity: EntityKind,
    pub latest: u32,
}

impl From<&SchemaRegistry> for RegistryInfo {
    fn from(registry: &SchemaRegistry) -> Self {
        Self {
            entity: registry.entity,
            latest: registry.latest,
        }
    }
}
