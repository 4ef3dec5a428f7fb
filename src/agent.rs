//! Agent configuration schema: entities, intents, and training phrases.
//!
//! The model is permissive. Optional fields stay optional, unknown keys are
//! carried through untouched, and training phrases that match neither the
//! plain nor the `text_parts` form are kept as raw YAML so the caller can warn
//! about them instead of failing the whole load.
use crate::tagging::Span;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Root of an agent config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<IntentDef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A custom entity type and its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_expansion_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub entries: Vec<EntityEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One canonical value with its synonyms.
///
/// Scalars (numbers, booleans) are read as text; anything else is dropped
/// with a warning so one odd entry never fails the whole load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    #[serde(
        default,
        deserialize_with = "lenient_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_synonyms",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub synonyms: Vec<String>,
}

/// An intent with its example utterances.
///
/// `training_phrases: None` means the key was absent, which is not the same
/// as an empty list: enrichment only touches intents that carry the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_phrases: Option<Vec<TrainingPhrase>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fallback: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Intent parameter bound to an entity type by display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_list: Option<bool>,
}

/// Training phrase as written in the agent config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrainingPhrase {
    Plain(String),
    Annotated(AnnotatedPhrase),
    Unrecognized(Value),
}

/// Phrase split into `text_parts`, some of them tagged with a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPhrase {
    pub text_parts: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TrainingPhrase {
    /// Wrap tagger output, collapsing a lone plain span to a bare string.
    pub fn from_spans(mut spans: Vec<Span>) -> Self {
        if spans.len() == 1 && !spans[0].is_entity() {
            if let Some(Span::Plain { text }) = spans.pop() {
                return TrainingPhrase::Plain(text);
            }
        }
        if spans.is_empty() {
            return TrainingPhrase::Plain(String::new());
        }
        TrainingPhrase::Annotated(AnnotatedPhrase {
            text_parts: spans,
            repeat_count: None,
            extra: BTreeMap::new(),
        })
    }

    /// Flattened phrase text, or `None` for unrecognized entries.
    pub fn text(&self) -> Option<String> {
        match self {
            TrainingPhrase::Plain(text) => Some(text.clone()),
            TrainingPhrase::Annotated(phrase) => {
                Some(phrase.text_parts.iter().map(Span::text).collect())
            }
            TrainingPhrase::Unrecognized(_) => None,
        }
    }

    /// True for a mapping that has `text_parts` but failed to parse as spans.
    pub fn is_malformed_text_parts(&self) -> bool {
        match self {
            TrainingPhrase::Unrecognized(Value::Mapping(map)) => {
                map.contains_key("text_parts")
            }
            _ => false,
        }
    }
}

impl IntentDef {
    /// Existing phrase texts, used as context for generation.
    pub fn existing_phrase_texts(&self) -> Vec<String> {
        self.training_phrases
            .iter()
            .flatten()
            .filter_map(TrainingPhrase::text)
            .collect()
    }

    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(None);
    }
    let text = scalar_text(&raw);
    if text.is_none() {
        tracing::warn!(value = ?raw, "ignoring entity value that is not a scalar");
    }
    Ok(text)
}

fn lenient_synonyms<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => Ok(items
            .iter()
            .filter_map(|item| {
                let text = scalar_text(item);
                if text.is_none() {
                    tracing::warn!(synonym = ?item, "ignoring synonym that is not a scalar");
                }
                text
            })
            .collect()),
        other => {
            tracing::warn!(synonyms = ?other, "ignoring synonyms that are not a list");
            Ok(Vec::new())
        }
    }
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<EntityEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => {
            tracing::warn!(entries = ?other, "ignoring entity entries that are not a list");
            return Ok(Vec::new());
        }
    };
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_mapping() {
            tracing::warn!(entry = ?item, "skipping entity entry that is not a mapping");
            continue;
        }
        match serde_yaml::from_value::<EntityEntry>(item) {
            Ok(entry) => entries.push(entry),
            Err(err) => tracing::warn!(%err, "skipping malformed entity entry"),
        }
    }
    Ok(entries)
}

/// Load an agent config from YAML.
pub fn load_agent_config(path: &Path) -> Result<AgentConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read agent config {}", path.display()))?;
    parse_agent_config(&text).with_context(|| format!("parse agent config {}", path.display()))
}

/// Parse an agent config document; an empty document is an error.
pub fn parse_agent_config(text: &str) -> Result<AgentConfig> {
    let value: Value = serde_yaml::from_str(text).context("parse YAML")?;
    if value.is_null() {
        return Err(anyhow!("agent config is empty"));
    }
    let config: AgentConfig = serde_yaml::from_value(value).context("decode agent config")?;
    Ok(config)
}

/// Write an agent config as YAML, replacing the destination atomically.
pub fn write_agent_config(path: &Path, config: &AgentConfig) -> Result<()> {
    let text = serde_yaml::to_string(config).context("serialize agent config")?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut staged = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("stage {}", path.display()))?;
    staged
        .write_all(text.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
entities:
  - display_name: color
    kind: KIND_MAP
    entries:
      - value: red
        synonyms: [crimson, scarlet]
      - value: blue
intents:
  - display_name: order.car
    description: Customer wants to buy a car
    training_phrases:
      - I want a car
      - text_parts:
          - text: "a "
          - text: red
            parameter_id: color
          - text: " car please"
        repeat_count: 2
      - text_parts:
          - parameter_id: color
      - 42
    parameters:
      - id: color
        entity_type_display_name: color
  - display_name: greet
agent_notes: kept as is
"#;

    #[test]
    fn parses_mixed_training_phrases() {
        let config = parse_agent_config(SAMPLE).expect("parse sample");
        assert_eq!(config.entities.len(), 1);
        assert_eq!(config.entities[0].entries[0].synonyms.len(), 2);
        assert!(config.entities[0].entries[1].synonyms.is_empty());

        let phrases = config.intents[0]
            .training_phrases
            .as_ref()
            .expect("phrases present");
        assert_eq!(phrases[0], TrainingPhrase::Plain("I want a car".to_string()));
        match &phrases[1] {
            TrainingPhrase::Annotated(phrase) => {
                assert_eq!(phrase.repeat_count, Some(2));
                assert_eq!(phrase.text_parts[1], Span::entity("red", "color"));
            }
            other => panic!("expected annotated phrase, got {other:?}"),
        }
        assert!(phrases[2].is_malformed_text_parts());
        assert!(matches!(phrases[3], TrainingPhrase::Unrecognized(_)));
        assert!(!phrases[3].is_malformed_text_parts());

        assert!(config.intents[1].training_phrases.is_none());
        assert_eq!(
            config.extra.get("agent_notes"),
            Some(&Value::String("kept as is".to_string()))
        );
    }

    #[test]
    fn entity_entries_with_odd_shapes_are_skipped_not_fatal() {
        let config = parse_agent_config(
            r#"
entities:
  - display_name: number
    entries:
      - value: 42
        synonyms: [forty-two, 7, {nested: true}]
      - value: {not: scalar}
        synonyms: lonely
  - display_name: bare
    entries: red
  - display_name: mixed
    entries: [red, {value: blue}]
"#,
        )
        .expect("odd entries still parse");

        assert_eq!(
            config.entities[0].entries,
            vec![
                EntityEntry {
                    value: Some("42".to_string()),
                    synonyms: vec!["forty-two".to_string(), "7".to_string()],
                },
                EntityEntry {
                    value: None,
                    synonyms: Vec::new(),
                },
            ]
        );
        assert!(config.entities[1].entries.is_empty());
        assert_eq!(
            config.entities[2].entries,
            vec![EntityEntry {
                value: Some("blue".to_string()),
                synonyms: Vec::new(),
            }]
        );

        let catalog = crate::tagging::EntityCatalog::build(&config.entities);
        assert_eq!(
            crate::tagging::tag("pick 42 or blue", &catalog),
            vec![
                Span::plain("pick "),
                Span::entity("42", "number"),
                Span::plain(" or "),
                Span::entity("blue", "mixed"),
            ]
        );
    }

    #[test]
    fn annotated_phrase_keeps_unknown_keys() {
        let config = parse_agent_config(
            "intents:\n  - display_name: greet\n    training_phrases:\n      - text_parts:\n          - text: hi\n        id: phrase-7\n",
        )
        .expect("parse");
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        let reparsed: Value = serde_yaml::from_str(&yaml).expect("reparse");
        assert_eq!(
            reparsed["intents"][0]["training_phrases"][0]["id"],
            Value::String("phrase-7".to_string())
        );
        assert!(matches!(
            config.intents[0].training_phrases.as_deref(),
            Some([TrainingPhrase::Annotated(_)])
        ));
    }

    #[test]
    fn existing_phrase_texts_flatten_parts() {
        let config = parse_agent_config(SAMPLE).expect("parse sample");
        assert_eq!(
            config.intents[0].existing_phrase_texts(),
            vec!["I want a car".to_string(), "a red car please".to_string()]
        );
        assert!(config.intents[1].existing_phrase_texts().is_empty());
    }

    #[test]
    fn from_spans_collapses_single_plain_span() {
        assert_eq!(
            TrainingPhrase::from_spans(vec![Span::plain("hello there")]),
            TrainingPhrase::Plain("hello there".to_string())
        );
        assert!(matches!(
            TrainingPhrase::from_spans(vec![Span::entity("red", "color")]),
            TrainingPhrase::Annotated(_)
        ));
        assert_eq!(
            TrainingPhrase::from_spans(Vec::new()),
            TrainingPhrase::Plain(String::new())
        );
    }

    #[test]
    fn annotated_phrase_serializes_parts() {
        let phrase = TrainingPhrase::from_spans(vec![
            Span::plain("paint it "),
            Span::entity("Red", "color"),
        ]);
        let yaml = serde_yaml::to_string(&phrase).expect("serialize phrase");
        let reparsed: Value = serde_yaml::from_str(&yaml).expect("reparse");
        let expected: Value = serde_yaml::from_str(
            "text_parts:\n  - text: 'paint it '\n  - text: Red\n    parameter_id: color\n",
        )
        .expect("expected yaml");
        assert_eq!(reparsed, expected);
    }

    #[test]
    fn empty_document_is_an_error() {
        let err = parse_agent_config("   \n").expect_err("empty config");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn write_then_load_keeps_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/agent.yaml");
        let config = parse_agent_config(SAMPLE).expect("parse sample");
        write_agent_config(&path, &config).expect("write config");
        let loaded = load_agent_config(&path).expect("load config");
        assert_eq!(loaded, config);
    }
}
