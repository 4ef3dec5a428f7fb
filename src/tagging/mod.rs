//! Entity tagging for training phrases.
//!
//! The catalog flattens entity values and synonyms into a length-ordered list,
//! and the tagger segments an utterance into plain and entity spans against it.
//! Both are pure; the catalog is immutable once built and can be shared across
//! threads.
mod catalog;
mod tagger;

pub use catalog::EntityCatalog;
pub use tagger::{tag, Span};
