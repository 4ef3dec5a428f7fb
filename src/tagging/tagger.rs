use super::EntityCatalog;
use serde::{Deserialize, Serialize};

/// A contiguous slice of an utterance, either literal text or tagged with the
/// entity that matched it.
///
/// Serializes as `{text}` or `{text, parameter_id}`, the `text_parts` form
/// used in agent configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Span {
    Entity {
        text: String,
        #[serde(rename = "parameter_id")]
        entity_id: String,
    },
    Plain {
        text: String,
    },
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Span::Plain { text: text.into() }
    }

    pub fn entity(text: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Span::Entity {
            text: text.into(),
            entity_id: entity_id.into(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Span::Entity { text, .. } | Span::Plain { text } => text,
        }
    }

    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Span::Entity { entity_id, .. } => Some(entity_id),
            Span::Plain { .. } => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Span::Entity { .. })
    }
}

/// Segment `utterance` into plain and entity spans, greedy longest match first.
///
/// At each cursor the whole catalog is scanned. The longest entry whose
/// leftmost case-insensitive match starts exactly at the cursor wins; equal
/// lengths go to the entry that comes first in the catalog. Entity spans carry
/// the utterance's own casing. When nothing matches at the cursor, the text up
/// to the nearest match of any entry (or the end of the string) becomes one
/// plain span. Concatenating the span texts always reproduces the input.
pub fn tag(utterance: &str, catalog: &EntityCatalog) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while cursor < utterance.len() {
        let mut best: Option<(usize, usize, &str)> = None;
        let mut nearest = utterance.len();

        for entry in catalog.entries() {
            let Some((start, end)) = entry.find_from(utterance, cursor) else {
                continue;
            };
            if start == cursor {
                let longer = match best {
                    Some((_, best_len, _)) => entry.char_len() > best_len,
                    None => true,
                };
                if longer {
                    best = Some((end, entry.char_len(), entry.entity_id()));
                }
            } else {
                nearest = nearest.min(start);
            }
        }

        match best {
            Some((end, _, entity_id)) => {
                spans.push(Span::entity(&utterance[cursor..end], entity_id));
                cursor = end;
            }
            None => {
                spans.push(Span::plain(&utterance[cursor..nearest]));
                cursor = nearest;
            }
        }
    }

    spans
}
