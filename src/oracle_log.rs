//! Oracle invocation log.
//!
//! Each call to the phrase generator appends one JSON line, so a user can see
//! what was asked for, what came back, and which intents came up short:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"intent":"order.car","duration_ms":1800,"requested":10,"generated":10,"outcome":"success",...}
//! ```
use crate::util::truncate_string;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current schema version for oracle log entries.
pub const ORACLE_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

/// Outcome of one oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleOutcome {
    /// At least as many phrases as requested.
    Success,
    /// Fewer phrases than requested.
    Partial,
    /// The oracle call failed.
    Failed,
}

impl std::fmt::Display for OracleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A single oracle log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was finished.
    pub ts: u64,

    /// Display name of the intent being enriched.
    pub intent: String,

    pub duration_ms: u64,

    /// Phrases asked for.
    pub requested: usize,

    /// Non-empty phrases left after line cleanup.
    pub generated: usize,

    pub outcome: OracleOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Times an oracle call and turns it into a log entry.
pub struct OracleLogBuilder {
    start: Instant,
    intent: String,
    requested: usize,
    prompt_preview: Option<String>,
}

impl OracleLogBuilder {
    pub fn new(intent: &str, requested: usize) -> Self {
        Self {
            start: Instant::now(),
            intent: intent.to_string(),
            requested,
            prompt_preview: None,
        }
    }

    /// Keep a prefix of the prompt for quick inspection.
    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let mut preview = truncate_string(prompt, PROMPT_PREVIEW_BYTES);
        if preview.len() < prompt.len() {
            preview.push_str("...");
        }
        self.prompt_preview = Some(preview);
        self
    }

    pub fn generated(self, generated: usize) -> OracleLogEntry {
        let outcome = if generated >= self.requested {
            OracleOutcome::Success
        } else {
            OracleOutcome::Partial
        };
        self.build(generated, outcome, None)
    }

    pub fn failed(self, error: impl Into<String>) -> OracleLogEntry {
        self.build(0, OracleOutcome::Failed, Some(error.into()))
    }

    fn build(self, generated: usize, outcome: OracleOutcome, error: Option<String>) -> OracleLogEntry {
        OracleLogEntry {
            schema_version: ORACLE_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            intent: self.intent,
            duration_ms: self.start.elapsed().as_millis() as u64,
            requested: self.requested,
            generated,
            outcome,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only JSONL log file.
#[derive(Debug, Clone)]
pub struct OracleLog {
    path: PathBuf,
}

impl OracleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &OracleLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open oracle log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize oracle log entry")?;
        writeln!(file, "{line}").context("write oracle log entry")?;
        Ok(())
    }
}

#[cfg(test)]
impl OracleLog {
    /// Read all entries, skipping corrupt lines.
    pub fn load(&self) -> Result<Vec<OracleLogEntry>> {
        use std::fs::File;
        use std::io::{BufRead, BufReader};

        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open oracle log: {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of oracle log", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OracleLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, %err, "skip corrupt oracle log entry");
                }
            }
        }
        Ok(entries)
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
