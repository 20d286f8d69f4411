//! Collection references and the host's collection lookup.
//!
//! Local numeric collection ids are not stable across library copies or
//! syncs. Stored syllabus data is therefore keyed by a durable reference,
//! `"<libraryId>:<collectionKey>"`, and older numeric keys are resolved
//! against live collections when they are migrated.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Durable reference to a collection within a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionRef {
    pub library_id: u64,
    pub key: String,
}

impl CollectionRef {
    pub fn new(library_id: u64, key: impl Into<String>) -> Self {
        Self {
            library_id,
            key: key.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library_id, self.key)
    }
}

/// Error parsing a `"<libraryId>:<collectionKey>"` reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid collection reference {input:?}: {reason}")]
pub struct ParseCollectionRefError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for CollectionRef {
    type Err = ParseCollectionRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ParseCollectionRefError {
            input: s.to_string(),
            reason,
        };
        let (library, key) = s.split_once(':').ok_or_else(|| fail("missing ':'"))?;
        if !is_plain_integer(library) {
            return Err(fail("library id is not a number"));
        }
        let library_id = library
            .parse::<u64>()
            .map_err(|_| fail("library id is out of range"))?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(fail("collection key must be non-empty and alphanumeric"));
        }
        Ok(Self::new(library_id, key))
    }
}

impl Serialize for CollectionRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CollectionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RefVisitor;

        impl Visitor<'_> for RefVisitor {
            type Value = CollectionRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a \"<libraryId>:<collectionKey>\" string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(RefVisitor)
    }
}

/// Lookup of live collections by their local numeric id.
///
/// Returning `None` is not an error: migrations drop data keyed by
/// collections that no longer exist.
pub trait CollectionResolver {
    fn resolve_collection(&self, id: u64) -> Option<CollectionRef>;
}

/// A resolver that knows no collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollections;

impl CollectionResolver for NoCollections {
    fn resolve_collection(&self, _id: u64) -> Option<CollectionRef> {
        None
    }
}

impl CollectionResolver for HashMap<u64, CollectionRef> {
    fn resolve_collection(&self, id: u64) -> Option<CollectionRef> {
        self.get(&id).cloned()
    }
}

impl CollectionResolver for BTreeMap<u64, CollectionRef> {
    fn resolve_collection(&self, id: u64) -> Option<CollectionRef> {
        self.get(&id).cloned()
    }
}

impl<R: CollectionResolver + ?Sized> CollectionResolver for &R {
    fn resolve_collection(&self, id: u64) -> Option<CollectionRef> {
        (**self).resolve_collection(id)
    }
}

/// True for an optionally signed run of ASCII digits.
pub(crate) fn is_plain_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a stored numeric collection id key.
pub(crate) fn parse_numeric_id(s: &str) -> Option<u64> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
