//! Dialogflow CX v3 REST backend.
//!
//! Requests carry a pre-issued bearer token; obtaining one is left to the
//! caller (for example `gcloud auth print-access-token`).
use crate::backend::{
    AgentBackend, BackendError, EntityTypeRequest, IntentRequest, ResourceKind, ResourceRef,
};
use crate::config::{parse_agent_path, AgentPath};
use crate::tagging::Span;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const LIST_PAGE_SIZE: &str = "1000";

/// REST base URL for an agent location.
pub fn regional_endpoint(location: &str) -> String {
    if location == "global" {
        "https://dialogflow.googleapis.com/v3".to_string()
    } else {
        format!("https://{location}-dialogflow.googleapis.com/v3")
    }
}

pub struct DialogflowBackend {
    agent: ureq::Agent,
    base_url: String,
    agent_path: String,
    authorization: String,
}

impl DialogflowBackend {
    /// Connect to `agent_path`, using `endpoint` instead of the regional host
    /// when given.
    pub fn new(agent_path: &str, access_token: &str, endpoint: Option<&str>) -> Result<Self> {
        let AgentPath {
            project,
            location,
            agent,
        } = parse_agent_path(agent_path)?;
        if access_token.trim().is_empty() {
            return Err(anyhow!("dialogflow access token is empty"));
        }
        let base_url = endpoint
            .map(|endpoint| endpoint.trim_end_matches('/').to_string())
            .unwrap_or_else(|| regional_endpoint(&location));
        let http: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        let agent_path = format!("projects/{project}/locations/{location}/agents/{agent}");
        tracing::info!(agent = %agent_path, base_url = %base_url, "dialogflow backend initialized");
        Ok(Self {
            agent: http,
            base_url,
            agent_path,
            authorization: format!("Bearer {}", access_token.trim()),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.agent_path, collection)
    }

    fn create<B, R>(
        &self,
        collection: &str,
        body: &B,
        kind: ResourceKind,
        display_name: &str,
    ) -> Result<R, BackendError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.collection_url(collection);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", self.authorization.as_str())
            .send_json(body)
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if status.as_u16() == 409 {
            return Err(BackendError::Conflict {
                kind,
                name: display_name.to_string(),
            });
        }
        if !status.is_success() {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            return Err(anyhow!("POST {url} failed with {status}: {}", detail.trim()).into());
        }
        let created = response
            .body_mut()
            .read_json()
            .with_context(|| format!("decode {kind} response"))?;
        Ok(created)
    }

    fn list(&self, collection: &str) -> Result<Vec<ResourceRef>> {
        let url = self.collection_url(collection);
        let mut resources = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .agent
                .get(&url)
                .header("Authorization", self.authorization.as_str())
                .query("pageSize", LIST_PAGE_SIZE);
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }
            let mut response = request.call().with_context(|| format!("GET {url}"))?;
            let status = response.status();
            if !status.is_success() {
                let detail = response.body_mut().read_to_string().unwrap_or_default();
                return Err(anyhow!("GET {url} failed with {status}: {}", detail.trim()));
            }
            let page: ListPage = response
                .body_mut()
                .read_json()
                .with_context(|| format!("decode {collection} page"))?;
            resources.extend(page.items.into_iter().map(ResourceRef::from));
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(collection, count = resources.len(), "listed resources");
        Ok(resources)
    }
}

impl AgentBackend for DialogflowBackend {
    fn create_entity_type(&self, request: &EntityTypeRequest) -> Result<ResourceRef, BackendError> {
        let body = EntityTypeBody::from(request);
        let created: ResourceBody = self.create(
            "entityTypes",
            &body,
            ResourceKind::EntityType,
            &request.display_name,
        )?;
        Ok(created.into())
    }

    fn create_intent(&self, request: &IntentRequest) -> Result<ResourceRef, BackendError> {
        let body = IntentBody::from(request);
        let created: ResourceBody =
            self.create("intents", &body, ResourceKind::Intent, &request.display_name)?;
        Ok(created.into())
    }

    fn list_entity_types(&self) -> Result<Vec<ResourceRef>> {
        self.list("entityTypes")
    }

    fn list_intents(&self) -> Result<Vec<ResourceRef>> {
        self.list("intents")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
}

impl From<ResourceBody> for ResourceRef {
    fn from(body: ResourceBody) -> Self {
        ResourceRef {
            name: body.name,
            display_name: body.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default, alias = "entityTypes", alias = "intents")]
    items: Vec<ResourceBody>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntityTypeBody<'a> {
    display_name: &'a str,
    kind: &'a str,
    auto_expansion_mode: &'a str,
    entities: Vec<EntityBody<'a>>,
}

#[derive(Debug, Serialize)]
struct EntityBody<'a> {
    value: &'a str,
    synonyms: &'a [String],
}

impl<'a> From<&'a EntityTypeRequest> for EntityTypeBody<'a> {
    fn from(request: &'a EntityTypeRequest) -> Self {
        EntityTypeBody {
            display_name: &request.display_name,
            kind: &request.kind,
            auto_expansion_mode: &request.auto_expansion_mode,
            entities: request
                .entities
                .iter()
                .map(|entity| EntityBody {
                    value: &entity.value,
                    synonyms: &entity.synonyms,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentBody<'a> {
    display_name: &'a str,
    description: &'a str,
    priority: i64,
    is_fallback: bool,
    training_phrases: Vec<TrainingPhraseBody<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParameterBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainingPhraseBody<'a> {
    parts: Vec<PartBody<'a>>,
    repeat_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParameterBody<'a> {
    id: &'a str,
    entity_type: &'a str,
    is_list: bool,
}

impl<'a> From<&'a Span> for PartBody<'a> {
    fn from(span: &'a Span) -> Self {
        PartBody {
            text: span.text(),
            parameter_id: span.entity_id(),
        }
    }
}

impl<'a> From<&'a IntentRequest> for IntentBody<'a> {
    fn from(request: &'a IntentRequest) -> Self {
        IntentBody {
            display_name: &request.display_name,
            description: &request.description,
            priority: request.priority,
            is_fallback: request.is_fallback,
            training_phrases: request
                .training_phrases
                .iter()
                .map(|phrase| TrainingPhraseBody {
                    parts: phrase.parts.iter().map(PartBody::from).collect(),
                    repeat_count: phrase.repeat_count,
                })
                .collect(),
            parameters: request
                .parameters
                .iter()
                .map(|parameter| ParameterBody {
                    id: &parameter.id,
                    entity_type: &parameter.entity_type,
                    is_list: parameter.is_list,
                })
                .collect(),
        }
    }
}
