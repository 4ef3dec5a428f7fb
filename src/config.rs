//! Run configuration helpers.
//!
//! `config.yaml` names the agent files, the phrase generator, and the target
//! agent. This module loads, validates, and resolves it so the workflow never
//! has to look at raw YAML or the environment.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default run config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// Gemini model used when the config does not pick one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Env fallback for `gemini_enrichment.api_key`.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Env fallback for `dialogflow.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "DIALOGFLOW_ACCESS_TOKEN";

const DEFAULT_PHRASES_TO_GENERATE: usize = 10;

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub agent_config: AgentFiles,
    #[serde(rename = "gemini_enrichment", alias = "enrichment", default)]
    pub enrichment: EnrichmentSettings,
    pub dialogflow: DialogflowSettings,
}

/// Where the original and enriched agent configs live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentFiles {
    pub original_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_file: Option<PathBuf>,
}

/// Phrase generation settings.
///
/// `command` selects a local LM command (prompt on stdin, phrases on stdout)
/// instead of the Gemini API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_phrases_to_generate")]
    pub phrases_to_generate: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            phrases_to_generate: DEFAULT_PHRASES_TO_GENERATE,
            model: None,
            command: None,
            log_file: None,
        }
    }
}

/// Target agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialogflowSettings {
    pub agent_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// How phrases get generated, after env fallbacks are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleSelection {
    Command(String),
    Gemini { api_key: String, model: String },
}

fn default_phrases_to_generate() -> usize {
    DEFAULT_PHRASES_TO_GENERATE
}

/// Build the config written by `dseed init`.
pub fn default_config() -> RunConfig {
    RunConfig {
        agent_config: AgentFiles {
            original_file: PathBuf::from("agent.yaml"),
            enriched_file: Some(PathBuf::from("agent.enriched.yaml")),
        },
        enrichment: EnrichmentSettings {
            model: Some(DEFAULT_GEMINI_MODEL.to_string()),
            ..EnrichmentSettings::default()
        },
        dialogflow: DialogflowSettings {
            agent_path: "projects/<project>/locations/<location>/agents/<agent>".to_string(),
            access_token: None,
            endpoint: None,
        },
    }
}

/// Load `config.yaml` from `path`.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    if text.trim().is_empty() {
        return Err(anyhow!("configuration file {} is empty", path.display()));
    }
    let config: RunConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("parse config {}", path.display()))?;
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Write a config stub to `path`.
pub fn write_config(path: &Path, config: &RunConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_yaml::to_string(config).context("serialize config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate values that serde cannot check on its own.
pub fn validate_config(config: &RunConfig) -> Result<()> {
    if config.enrichment.enabled {
        if config.agent_config.enriched_file.is_none() {
            return Err(anyhow!(
                "agent_config.enriched_file is required when enrichment is enabled"
            ));
        }
        validate_enrichment(config)?;
    } else if config.agent_config.original_file.as_os_str().is_empty() {
        return Err(anyhow!("agent_config.original_file must be non-empty"));
    }
    parse_agent_path(&config.dialogflow.agent_path)?;
    Ok(())
}

/// Checks only the settings enrichment reads.
///
/// The `dialogflow` section is left alone so `enrich` works before the agent
/// path has been edited; the destination is checked by the caller since
/// `--out` can stand in for `enriched_file`.
pub fn validate_enrichment(config: &RunConfig) -> Result<()> {
    if config.agent_config.original_file.as_os_str().is_empty() {
        return Err(anyhow!("agent_config.original_file must be non-empty"));
    }
    if config.enrichment.phrases_to_generate == 0 {
        return Err(anyhow!("gemini_enrichment.phrases_to_generate must be positive"));
    }
    if let Some(command) = &config.enrichment.command {
        if command.trim().is_empty() {
            return Err(anyhow!("gemini_enrichment.command must be non-empty"));
        }
    }
    Ok(())
}

/// Resolve the phrase generator, falling back to `GEMINI_API_KEY`.
pub fn resolve_oracle(settings: &EnrichmentSettings) -> Result<OracleSelection> {
    if let Some(command) = settings.command.as_deref().map(str::trim) {
        if !command.is_empty() {
            return Ok(OracleSelection::Command(command.to_string()));
        }
    }
    let api_key = non_empty(settings.api_key.as_deref())
        .map(str::to_string)
        .or_else(|| env_non_empty(GEMINI_API_KEY_ENV))
        .ok_or_else(|| anyhow!("Gemini API key cannot be empty (set api_key or {GEMINI_API_KEY_ENV})"))?;
    let model = non_empty(settings.model.as_deref())
        .unwrap_or(DEFAULT_GEMINI_MODEL)
        .to_string();
    Ok(OracleSelection::Gemini { api_key, model })
}

/// Resolve the bearer token, falling back to `DIALOGFLOW_ACCESS_TOKEN`.
pub fn resolve_access_token(settings: &DialogflowSettings) -> Result<String> {
    non_empty(settings.access_token.as_deref())
        .map(str::to_string)
        .or_else(|| env_non_empty(ACCESS_TOKEN_ENV))
        .ok_or_else(|| {
            anyhow!("dialogflow access token missing (set access_token or {ACCESS_TOKEN_ENV})")
        })
}

/// Parsed `projects/<p>/locations/<l>/agents/<a>` resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPath {
    pub project: String,
    pub location: String,
    pub agent: String,
}

pub fn parse_agent_path(raw: &str) -> Result<AgentPath> {
    let parts: Vec<&str> = raw.trim().trim_matches('/').split('/').collect();
    match parts.as_slice() {
        ["projects", project, "locations", location, "agents", agent]
            if [project, location, agent]
                .iter()
                .all(|segment| !segment.is_empty() && !segment.starts_with('<')) =>
        {
            Ok(AgentPath {
                project: project.to_string(),
                location: location.to_string(),
                agent: agent.to_string(),
            })
        }
        _ => Err(anyhow!(
            "dialogflow.agent_path must look like projects/<p>/locations/<l>/agents/<a> (got {raw:?})"
        )),
    }
}

/// Resolve a config-relative path against the config file's directory.
pub fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) => parent.join(path),
        None => path.to_path_buf(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
