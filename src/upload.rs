//! Upload entities and intents from an agent config.
//!
//! Entities go first because intent parameters refer to them. Each resource
//! gets its own outcome; a conflict or failure on one never stops the rest.
use crate::agent::{AgentConfig, EntityDef, IntentDef, TrainingPhrase};
use crate::backend::{
    AgentBackend, BackendError, EntityTypeRequest, EntityValue, IntentRequest, ParameterRequest,
    PhraseRequest, ResourceKind, ResourceRef,
};
use crate::tagging::Span;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_ENTITY_KIND: &str = "KIND_MAP";
pub const DEFAULT_AUTO_EXPANSION_MODE: &str = "AUTO_EXPANSION_MODE_DEFAULT";
pub const DEFAULT_INTENT_PRIORITY: i64 = 500_000;

/// Prefix marking built-in system entity types.
const SYSTEM_ENTITY_PREFIX: &str = "@sys.";
const SYSTEM_ENTITY_TYPE_ROOT: &str = "projects/-/locations/-/agents/-/entityTypes/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Created,
    AlreadyExists,
    Failed,
    /// Not sent: the definition lacks a display name.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    pub kind: ResourceKind,
    pub display_name: String,
    pub outcome: UploadOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub entities: Vec<UploadRecord>,
    pub intents: Vec<UploadRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub current_intents: Vec<String>,
}

impl UploadReport {
    pub fn count(&self, outcome: UploadOutcome) -> usize {
        self.entities
            .iter()
            .chain(&self.intents)
            .filter(|record| record.outcome == outcome)
            .count()
    }
}

pub struct Uploader<'a> {
    backend: &'a dyn AgentBackend,
}

impl<'a> Uploader<'a> {
    pub fn new(backend: &'a dyn AgentBackend) -> Self {
        Self { backend }
    }

    /// Upload entities, then intents, then list what the agent now has.
    pub fn upload(&self, config: &AgentConfig) -> UploadReport {
        let entities = self.upload_entities(config);
        let intents = self.upload_intents(config);
        let current_intents = match self.list_current_intents() {
            Ok(names) => names,
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(error = %message, "error fetching intents");
                Vec::new()
            }
        };
        UploadReport {
            entities,
            intents,
            current_intents,
        }
    }

    pub fn upload_entities(&self, config: &AgentConfig) -> Vec<UploadRecord> {
        if config.entities.is_empty() {
            tracing::info!("no custom entities defined");
            return Vec::new();
        }
        config
            .entities
            .iter()
            .enumerate()
            .map(|(index, entity)| self.upload_entity(index, entity))
            .collect()
    }

    fn upload_entity(&self, index: usize, entity: &EntityDef) -> UploadRecord {
        let Some(display_name) = entity
            .display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
        else {
            tracing::warn!(index, "skipping entity due to missing display_name");
            return invalid(ResourceKind::EntityType, index);
        };
        let mut warnings = Vec::new();
        let entities = entity
            .entries
            .iter()
            .filter_map(|entry| match &entry.value {
                Some(value) => Some(EntityValue {
                    value: value.clone(),
                    synonyms: entry.synonyms.clone(),
                }),
                None => {
                    warnings.push("dropped entry without value".to_string());
                    None
                }
            })
            .collect();
        let request = EntityTypeRequest {
            display_name: display_name.to_string(),
            kind: entity
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_ENTITY_KIND.to_string()),
            auto_expansion_mode: entity
                .auto_expansion_mode
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTO_EXPANSION_MODE.to_string()),
            entities,
        };
        let result = self.backend.create_entity_type(&request);
        record(ResourceKind::EntityType, display_name, result, warnings)
    }

    pub fn upload_intents(&self, config: &AgentConfig) -> Vec<UploadRecord> {
        let mut entity_types: Option<Vec<ResourceRef>> = None;
        config
            .intents
            .iter()
            .enumerate()
            .map(|(index, intent)| self.upload_intent(index, intent, &mut entity_types))
            .collect()
    }

    fn upload_intent(
        &self,
        index: usize,
        intent: &IntentDef,
        entity_types: &mut Option<Vec<ResourceRef>>,
    ) -> UploadRecord {
        let Some(display_name) = intent.name() else {
            tracing::warn!(index, "skipping intent due to missing display_name");
            return invalid(ResourceKind::Intent, index);
        };
        tracing::info!(intent = display_name, "processing intent");

        let mut warnings = Vec::new();
        let training_phrases = phrase_requests(display_name, intent, &mut warnings);

        let mut parameters = Vec::new();
        for parameter in &intent.parameters {
            let (Some(id), Some(entity_type)) = (
                parameter.id.as_deref().filter(|id| !id.is_empty()),
                parameter
                    .entity_type_display_name
                    .as_deref()
                    .filter(|name| !name.is_empty()),
            ) else {
                tracing::warn!(intent = display_name, ?parameter, "skipping malformed parameter");
                warnings.push("skipped malformed parameter".to_string());
                continue;
            };
            let Some(resource) = self.resolve_entity_type(entity_type, entity_types) else {
                tracing::error!(
                    intent = display_name,
                    entity_type,
                    "could not resolve entity type; skipping parameter"
                );
                warnings.push(format!("unresolved entity type '{entity_type}' for '{id}'"));
                continue;
            };
            parameters.push(ParameterRequest {
                id: id.to_string(),
                entity_type: resource,
                is_list: parameter.is_list.unwrap_or(false),
            });
        }

        let request = IntentRequest {
            display_name: display_name.to_string(),
            description: intent
                .description
                .clone()
                .unwrap_or_else(|| format!("Intent for {display_name}")),
            priority: intent.priority.unwrap_or(DEFAULT_INTENT_PRIORITY),
            is_fallback: intent.is_fallback.unwrap_or(false),
            training_phrases,
            parameters,
        };
        let result = self.backend.create_intent(&request);
        record(ResourceKind::Intent, display_name, result, warnings)
    }

    /// Map an entity type display name to its resource name.
    ///
    /// System types map to the wildcard agent path; custom types are looked up
    /// in the agent's entity types, listed once and cached.
    fn resolve_entity_type(
        &self,
        display_name: &str,
        cache: &mut Option<Vec<ResourceRef>>,
    ) -> Option<String> {
        if let Some(system) = display_name.strip_prefix('@') {
            if display_name.starts_with(SYSTEM_ENTITY_PREFIX) {
                return Some(format!("{SYSTEM_ENTITY_TYPE_ROOT}{system}"));
            }
        }
        if cache.is_none() {
            match self.backend.list_entity_types() {
                Ok(listed) => *cache = Some(listed),
                Err(err) => {
                    let message = format!("{err:#}");
                    tracing::error!(
                        entity_type = display_name,
                        error = %message,
                        "error resolving custom entity"
                    );
                    return None;
                }
            }
        }
        cache
            .as_ref()?
            .iter()
            .find(|resource| resource.display_name == display_name)
            .map(|resource| resource.name.clone())
    }

    /// Sorted, de-duplicated display names of the agent's intents.
    pub fn list_current_intents(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .backend
            .list_intents()?
            .into_iter()
            .map(|intent| intent.display_name)
            .collect();
        for name in &names {
            tracing::info!(intent = %name, "current intent");
        }
        Ok(names.into_iter().collect())
    }
}

fn phrase_requests(
    intent: &str,
    definition: &IntentDef,
    warnings: &mut Vec<String>,
) -> Vec<PhraseRequest> {
    let mut requests = Vec::new();
    for phrase in definition.training_phrases.iter().flatten() {
        match phrase {
            TrainingPhrase::Plain(text) => requests.push(PhraseRequest {
                parts: vec![Span::plain(text.as_str())],
                repeat_count: 1,
            }),
            TrainingPhrase::Annotated(annotated) => requests.push(PhraseRequest {
                parts: annotated.text_parts.clone(),
                repeat_count: annotated.repeat_count.unwrap_or(1),
            }),
            TrainingPhrase::Unrecognized(raw) => {
                if phrase.is_malformed_text_parts() {
                    tracing::warn!(intent, ?raw, "skipping malformed text_parts");
                    warnings.push("skipped malformed text_parts".to_string());
                } else {
                    tracing::warn!(intent, ?raw, "unrecognized training phrase format");
                    warnings.push("skipped unrecognized training phrase".to_string());
                }
            }
        }
    }
    requests
}

fn invalid(kind: ResourceKind, index: usize) -> UploadRecord {
    UploadRecord {
        kind,
        display_name: format!("#{index}"),
        outcome: UploadOutcome::Invalid,
        resource: None,
        error: Some("missing display_name".to_string()),
        warnings: Vec::new(),
    }
}

fn record(
    kind: ResourceKind,
    display_name: &str,
    result: Result<ResourceRef, BackendError>,
    warnings: Vec<String>,
) -> UploadRecord {
    let (outcome, resource, error) = match result {
        Ok(created) => {
            tracing::info!(%kind, name = display_name, resource = %created.name, "created");
            (UploadOutcome::Created, Some(created.name), None)
        }
        Err(BackendError::Conflict { .. }) => {
            tracing::info!(%kind, name = display_name, "already exists; skipping");
            (UploadOutcome::AlreadyExists, None, None)
        }
        Err(err @ BackendError::Failure(_)) => {
            let message = format!("{err:#}");
            tracing::error!(%kind, name = display_name, error = %message, "error creating resource");
            (UploadOutcome::Failed, None, Some(message))
        }
    };
    UploadRecord {
        kind,
        display_name: display_name.to_string(),
        outcome,
        resource,
        error,
        warnings,
    }
}
