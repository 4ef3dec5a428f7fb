//! Training phrase enrichment.
//!
//! For every intent that carries a `training_phrases` key, ask the oracle for
//! new phrases, clean up the returned lines, tag entity mentions against one
//! shared catalog, and append the results. Oracle failures cost that intent
//! its new phrases; they never abort the run.
use crate::agent::{AgentConfig, IntentDef, TrainingPhrase};
use crate::oracle::PhraseOracle;
use crate::oracle_log::{OracleLog, OracleLogBuilder};
use crate::tagging::{tag, EntityCatalog};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const TRAINING_PHRASES_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/training_phrases.md"
));

/// What happened to one intent during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentEnrichment {
    pub intent: String,
    pub requested: usize,
    pub generated: usize,
    /// Generated phrases that picked up at least one entity span.
    pub tagged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of an enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub intents: Vec<IntentEnrichment>,
    /// Intents left alone because they have no `training_phrases` key or name.
    pub skipped: Vec<String>,
}

impl EnrichReport {
    pub fn generated_total(&self) -> usize {
        self.intents.iter().map(|intent| intent.generated).sum()
    }
}

pub struct Enricher<'a> {
    oracle: &'a dyn PhraseOracle,
    phrases_to_generate: usize,
    log: Option<&'a OracleLog>,
}

impl<'a> Enricher<'a> {
    pub fn new(oracle: &'a dyn PhraseOracle, phrases_to_generate: usize) -> Self {
        Self {
            oracle,
            phrases_to_generate,
            log: None,
        }
    }

    pub fn with_log(mut self, log: &'a OracleLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Return an enriched copy of `config` and a per-intent report.
    pub fn enrich(&self, config: &AgentConfig) -> (AgentConfig, EnrichReport) {
        let mut enriched = config.clone();
        let mut report = EnrichReport::default();
        let catalog = EntityCatalog::build(&enriched.entities);
        if catalog.is_empty() {
            tracing::warn!("no entity values to match; generated phrases stay untagged");
        }

        for (index, intent) in enriched.intents.iter_mut().enumerate() {
            let Some(name) = intent.name().map(str::to_string) else {
                tracing::warn!(index, "intent has no display_name; skipping enrichment");
                report.skipped.push(format!("#{index}"));
                continue;
            };
            if intent.training_phrases.is_none() {
                tracing::warn!(
                    intent = %name,
                    "intent has no training_phrases key; skipping enrichment"
                );
                report.skipped.push(name);
                continue;
            }
            report
                .intents
                .push(self.enrich_intent(&name, intent, &catalog));
        }

        tracing::info!(
            intents = report.intents.len(),
            skipped = report.skipped.len(),
            generated = report.generated_total(),
            "agent configuration enrichment complete"
        );
        (enriched, report)
    }

    fn enrich_intent(
        &self,
        name: &str,
        intent: &mut IntentDef,
        catalog: &EntityCatalog,
    ) -> IntentEnrichment {
        let description = intent.description.clone().unwrap_or_default();
        let existing = intent.existing_phrase_texts();
        let prompt = build_prompt(name, &description, &existing, self.phrases_to_generate);
        let entry = OracleLogBuilder::new(name, self.phrases_to_generate).with_prompt_preview(&prompt);

        let (phrases, error, entry) = match self.oracle.generate(&prompt) {
            Ok(text) => {
                let phrases = clean_generated_lines(&text);
                let count = phrases.len();
                (phrases, None, entry.generated(count))
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(intent = %name, error = %message, "error generating phrases");
                (Vec::new(), Some(message.clone()), entry.failed(message))
            }
        };
        if let Some(log) = self.log {
            if let Err(err) = log.append(&entry) {
                let message = format!("{err:#}");
                tracing::warn!(error = %message, "failed to append oracle log");
            }
        }

        let formatted: Vec<TrainingPhrase> = phrases
            .iter()
            .map(|phrase| TrainingPhrase::from_spans(tag(phrase, catalog)))
            .collect();
        let tagged = formatted
            .iter()
            .filter(|phrase| matches!(phrase, TrainingPhrase::Annotated(_)))
            .count();
        tracing::info!(
            intent = %name,
            generated = formatted.len(),
            tagged,
            outcome = %entry.outcome,
            "generated and formatted phrases"
        );
        for phrase in &formatted {
            tracing::debug!(intent = %name, phrase = ?phrase, "new training phrase");
        }

        let generated = formatted.len();
        intent
            .training_phrases
            .get_or_insert_with(Vec::new)
            .extend(formatted);

        IntentEnrichment {
            intent: name.to_string(),
            requested: self.phrases_to_generate,
            generated,
            tagged,
            error,
        }
    }
}

/// Fill the embedded prompt template for one intent.
pub fn build_prompt(name: &str, description: &str, existing: &[String], count: usize) -> String {
    let existing_phrases = if existing.is_empty() {
        "(none)".to_string()
    } else {
        existing
            .iter()
            .map(|phrase| format!("- {phrase}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    TRAINING_PHRASES_PROMPT
        .replace("{intent_name}", name)
        .replace("{description}", description)
        .replace("{existing_phrases}", &existing_phrases)
        .replace("{count}", &count.to_string())
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^\s*(\d+\.?\s*|[-*]\s*)?").expect("valid list marker regex"))
}

/// Split oracle output into phrases, dropping list markers and blank lines.
pub fn clean_generated_lines(text: &str) -> Vec<String> {
    text.trim()
        .lines()
        .map(|line| list_marker().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
