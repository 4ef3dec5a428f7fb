use crate::agent::EntityDef;
use regex::{Regex, RegexBuilder};

/// One matchable text and the entity that owns it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    text: String,
    entity_id: String,
    char_len: usize,
    matcher: Regex,
}

impl CatalogEntry {
    /// Build an entry, returning `None` for empty text.
    ///
    /// Texts are escaped before compilation so pattern metacharacters match
    /// literally.
    pub fn new(text: &str, entity_id: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let matcher = match RegexBuilder::new(&regex::escape(text))
            .case_insensitive(true)
            .build()
        {
            Ok(matcher) => matcher,
            Err(err) => {
                tracing::warn!(text, entity_id, %err, "skipping catalog text that failed to compile");
                return None;
            }
        };
        Some(Self {
            text: text.to_string(),
            entity_id: entity_id.to_string(),
            char_len: text.chars().count(),
            matcher,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Length in characters, the ordering key for greedy matching.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Byte range of the leftmost case-insensitive match at or after `start`.
    pub(super) fn find_from(&self, haystack: &str, start: usize) -> Option<(usize, usize)> {
        self.matcher
            .find_at(haystack, start)
            .map(|found| (found.start(), found.end()))
    }
}

/// Flattened, length-ordered lookup list of every entity value and synonym.
///
/// Entries are sorted by character length, longest first. The sort is stable,
/// so entries of equal length keep insertion order and the first inserted wins
/// a tie during tagging.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: Vec<CatalogEntry>,
}

impl EntityCatalog {
    /// Flatten entity definitions into a catalog.
    ///
    /// Every value and synonym becomes one entry owned by the entity's display
    /// name. Entities without a display name, entries without a value, and
    /// empty texts are skipped.
    pub fn build(entities: &[EntityDef]) -> Self {
        let mut pairs = Vec::new();
        for entity in entities {
            let Some(display_name) = entity
                .display_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
            else {
                tracing::warn!("skipping entity without display_name for matching");
                continue;
            };
            for entry in &entity.entries {
                let Some(value) = entry.value.as_deref() else {
                    tracing::warn!(entity = display_name, "skipping entry without value");
                    continue;
                };
                pairs.push((value, display_name));
                for synonym in &entry.synonyms {
                    pairs.push((synonym.as_str(), display_name));
                }
            }
        }
        let catalog = Self::from_pairs(pairs);
        tracing::info!(entries = catalog.len(), "prepared entities for matching");
        for entry in catalog.entries() {
            tracing::trace!(text = entry.text(), entity = entry.entity_id(), "catalog entry");
        }
        catalog
    }

    /// Build a catalog from `(text, entity_id)` pairs in insertion order.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries = Vec::new();
        for (text, entity_id) in pairs {
            match CatalogEntry::new(text, entity_id) {
                Some(entry) => entries.push(entry),
                None if text.is_empty() => {
                    tracing::warn!(entity = entity_id, "rejecting empty catalog text");
                }
                None => {}
            }
        }
        entries.sort_by(|a, b| b.char_len.cmp(&a.char_len));
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
