//! Stored syllabus entities and their version histories.

pub mod assignment;
pub mod collection_meta;
pub mod item_data;

pub use assignment::{Assignment, AssignmentDraft, AssignmentStatus};
pub use collection_meta::{ClassMetadata, ClassStatus, CollectionDictionary, CollectionMetadata};
pub use item_data::ItemSyllabusData;
