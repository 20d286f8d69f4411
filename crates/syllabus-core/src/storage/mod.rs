//! Host storage the syllabus data lives in.
//!
//! The host application owns the actual backends. Collection metadata goes
//! to its key-value preference store; per-item data goes to a namespaced
//! line of each item's free-text "extra" field.

mod extra;
mod file;
mod memory;

pub use extra::*;
pub use file::*;
pub use memory::*;

use crate::error::StorageError;

/// Key-value preference store.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Access to each item's free-text "extra" field.
pub trait ItemFieldStore {
    /// The item's extra field, `None` when it is unset.
    fn extra(&self, item: &str) -> Result<Option<String>, StorageError>;

    fn set_extra(&self, item: &str, extra: &str) -> Result<(), StorageError>;
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

impl<T: ItemFieldStore + ?Sized> ItemFieldStore for &T {
    fn extra(&self, item: &str) -> Result<Option<String>, StorageError> {
        (**self).extra(item)
    }

    fn set_extra(&self, item: &str, extra: &str) -> Result<(), StorageError> {
        (**self).set_extra(item, extra)
    }
}
