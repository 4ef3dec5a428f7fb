//! Phrase generators ("oracles") for enrichment.
//!
//! An oracle takes a prompt and returns freeform text. Two backends exist:
//!
//! - [`CommandOracle`] pipes the prompt into a user-configured command
//!   (`llm`, `ollama run`, a wrapper script) and reads stdout.
//! - [`GeminiOracle`] calls the Gemini `generateContent` REST endpoint.
//!
//! Neither retries; a failed call costs one intent its new phrases, nothing
//! more.
use crate::config::OracleSelection;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Default Gemini REST base URL.
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Anything that turns a prompt into text.
pub trait PhraseOracle {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the oracle chosen by the run config.
pub fn oracle_from_selection(selection: OracleSelection) -> Result<Box<dyn PhraseOracle>> {
    match selection {
        OracleSelection::Command(command) => Ok(Box::new(CommandOracle::new(command))),
        OracleSelection::Gemini { api_key, model } => {
            Ok(Box::new(GeminiOracle::new(api_key, model)?))
        }
    }
}

/// Local command oracle; the command line is split with shell-words.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    command: String,
}

impl CommandOracle {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl PhraseOracle for CommandOracle {
    fn generate(&self, prompt: &str) -> Result<String> {
        let args = shell_words::split(&self.command)
            .with_context(|| format!("parse LM command: {}", self.command))?;
        if args.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }

        let start = Instant::now();
        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {}", args[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command may exit without reading its input.
            if let Err(err) = stdin.write_all(prompt.as_bytes()) {
                if err.kind() != ErrorKind::BrokenPipe {
                    return Err(err).context("write prompt to LM stdin");
                }
            }
        }

        let output = child.wait_with_output().context("wait for LM command")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

const GEMINI_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini REST oracle.
#[derive(Clone)]
pub struct GeminiOracle {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("Gemini API key cannot be empty"));
        }
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(GEMINI_TIMEOUT))
            .build()
            .into();
        tracing::info!("gemini oracle initialized");
        Ok(Self {
            agent,
            api_key,
            model: model.into(),
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl PhraseOracle for GeminiOracle {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.url();
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .send_json(&request)
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            return Err(anyhow!(
                "Gemini request failed with {status}: {}",
                detail.trim()
            ));
        }
        let parsed: GenerateResponse = response
            .body_mut()
            .read_json()
            .context("decode Gemini response")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %self.model,
            "gemini generate complete"
        );
        response_text(parsed)
    }
}

fn response_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("Gemini response contained no text"));
    }
    Ok(text)
}
