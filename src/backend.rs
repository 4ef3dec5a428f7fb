//! Agent backend seam.
//!
//! The uploader talks to the target platform only through [`AgentBackend`].
//! Creation calls return a typed [`BackendError`] so "already exists" is a
//! variant the caller can match on, not a message to grep.
use crate::tagging::Span;
use serde::Serialize;
use std::fmt;

/// Resource families the backend creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    EntityType,
    Intent,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::EntityType => f.write_str("entity type"),
            ResourceKind::Intent => f.write_str("intent"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A resource with the same display name is already there.
    #[error("{kind} '{name}' already exists")]
    Conflict { kind: ResourceKind, name: String },
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

/// Stable resource name plus the display name it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeRequest {
    pub display_name: String,
    pub kind: String,
    pub auto_expansion_mode: String,
    pub entities: Vec<EntityValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValue {
    pub value: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub display_name: String,
    pub description: String,
    pub priority: i64,
    pub is_fallback: bool,
    pub training_phrases: Vec<PhraseRequest>,
    pub parameters: Vec<ParameterRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseRequest {
    pub parts: Vec<Span>,
    pub repeat_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRequest {
    pub id: String,
    /// Full entity type resource name.
    pub entity_type: String,
    pub is_list: bool,
}

pub trait AgentBackend {
    fn create_entity_type(&self, request: &EntityTypeRequest) -> Result<ResourceRef, BackendError>;
    fn create_intent(&self, request: &IntentRequest) -> Result<ResourceRef, BackendError>;
    fn list_entity_types(&self) -> anyhow::Result<Vec<ResourceRef>>;
    fn list_intents(&self) -> anyhow::Result<Vec<ResourceRef>>;
}
