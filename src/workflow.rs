use crate::agent::{load_agent_config, write_agent_config, TrainingPhrase};
use crate::cli::{EnrichArgs, InitArgs, ListArgs, RunArgs, TagArgs, UploadArgs};
use crate::config::{
    self, load_config, resolve_access_token, resolve_oracle, resolve_relative, validate_config,
    validate_enrichment, RunConfig,
};
use crate::dialogflow::DialogflowBackend;
use crate::enrich::Enricher;
use crate::oracle::oracle_from_selection;
use crate::oracle_log::OracleLog;
use crate::tagging::{tag, EntityCatalog};
use crate::upload::{UploadOutcome, UploadReport, Uploader};
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run_init(args: InitArgs) -> Result<()> {
    let config_path = args.config.config;
    if config_path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    config::write_config(&config_path, &config::default_config())?;
    eprintln!("wrote {}", shown(&config_path));
    eprintln!("edit dialogflow.agent_path before running upload");
    Ok(())
}

pub fn run_enrich(args: EnrichArgs) -> Result<()> {
    let ctx = RunContext::load(&args.config.config)?;
    validate_enrichment(&ctx.config)?;
    let out = match args.out {
        Some(out) => out,
        None => ctx.enriched_path().ok_or_else(|| {
            anyhow!("agent_config.enriched_file is not set (pass --out to choose a destination)")
        })?,
    };
    let log_path = args.lm_log.or_else(|| ctx.oracle_log_path());
    ctx.enrich(&out, log_path)?;
    Ok(())
}

pub fn run_upload(args: UploadArgs) -> Result<()> {
    let ctx = RunContext::load(&args.config.config)?;
    validate_config(&ctx.config)?;
    let agent_file = match args.agent_file {
        Some(path) => path,
        None => ctx.upload_source(),
    };
    let report = ctx.upload(&agent_file)?;
    finish_upload(&report, args.report.as_deref())
}

/// Enrich when enabled, then upload whichever agent file is current.
pub fn run_full(args: RunArgs) -> Result<()> {
    let ctx = RunContext::load(&args.config.config)?;
    validate_config(&ctx.config)?;
    let agent_file = if ctx.config.enrichment.enabled {
        let out = ctx
            .enriched_path()
            .ok_or_else(|| anyhow!("agent_config.enriched_file is required for enrichment"))?;
        ctx.enrich(&out, ctx.oracle_log_path())?;
        out
    } else {
        tracing::info!("phrase enrichment disabled; uploading the original agent config");
        ctx.original_path()
    };
    let report = ctx.upload(&agent_file)?;
    finish_upload(&report, args.report.as_deref())
}

pub fn run_tag(args: TagArgs) -> Result<()> {
    let agent = load_agent_config(&args.agent_file)?;
    let catalog = EntityCatalog::build(&agent.entities);
    let phrases: Vec<TrainingPhrase> = args
        .phrases
        .iter()
        .map(|phrase| TrainingPhrase::from_spans(tag(phrase, &catalog)))
        .collect();
    let text = if args.json {
        serde_json::to_string_pretty(&phrases).context("serialize phrases")?
    } else {
        serde_yaml::to_string(&phrases).context("serialize phrases")?
    };
    println!("{}", text.trim_end());
    Ok(())
}

pub fn run_list(args: ListArgs) -> Result<()> {
    let ctx = RunContext::load(&args.config.config)?;
    validate_config(&ctx.config)?;
    let backend = ctx.backend()?;
    for name in Uploader::new(&backend).list_current_intents()? {
        println!("{name}");
    }
    Ok(())
}

/// Loaded run config plus the path it came from, for relative resolution.
struct RunContext {
    config_path: PathBuf,
    config: RunConfig,
}

impl RunContext {
    fn load(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        resolve_relative(&self.config_path, path)
    }

    fn original_path(&self) -> PathBuf {
        self.resolve(&self.config.agent_config.original_file)
    }

    fn enriched_path(&self) -> Option<PathBuf> {
        self.config
            .agent_config
            .enriched_file
            .as_deref()
            .map(|path| self.resolve(path))
    }

    fn oracle_log_path(&self) -> Option<PathBuf> {
        self.config
            .enrichment
            .log_file
            .as_deref()
            .map(|path| self.resolve(path))
    }

    /// The enriched file when it exists, otherwise the original.
    fn upload_source(&self) -> PathBuf {
        match self.enriched_path() {
            Some(enriched) if enriched.is_file() => enriched,
            _ => self.original_path(),
        }
    }

    fn enrich(&self, out: &Path, log_path: Option<PathBuf>) -> Result<()> {
        let settings = &self.config.enrichment;
        let oracle = oracle_from_selection(resolve_oracle(settings)?)?;
        let original = self.original_path();
        let agent = load_agent_config(&original)?;
        tracing::info!(
            source = %original.display(),
            phrases = settings.phrases_to_generate,
            "starting phrase enrichment"
        );

        let log = log_path.map(OracleLog::new);
        let mut enricher = Enricher::new(oracle.as_ref(), settings.phrases_to_generate);
        if let Some(log) = &log {
            enricher = enricher.with_log(log);
        }
        let (enriched, report) = enricher.enrich(&agent);
        write_agent_config(out, &enriched)?;

        let failed = report
            .intents
            .iter()
            .filter(|intent| intent.error.is_some())
            .count();
        eprintln!(
            "enriched {} intents (+{} phrases, {} failed, {} skipped)",
            report.intents.len(),
            report.generated_total(),
            failed,
            report.skipped.len()
        );
        eprintln!("wrote {}", shown(out));
        if let Some(log) = &log {
            eprintln!("oracle log: {}", shown(log.path()));
        }
        Ok(())
    }

    fn backend(&self) -> Result<DialogflowBackend> {
        let settings = &self.config.dialogflow;
        let token = resolve_access_token(settings)?;
        DialogflowBackend::new(&settings.agent_path, &token, settings.endpoint.as_deref())
    }

    fn upload(&self, agent_file: &Path) -> Result<UploadReport> {
        let agent = load_agent_config(agent_file)?;
        tracing::info!(source = %agent_file.display(), "uploading agent config");
        let backend = self.backend()?;
        Ok(Uploader::new(&backend).upload(&agent))
    }
}

fn finish_upload(report: &UploadReport, report_path: Option<&Path>) -> Result<()> {
    eprintln!(
        "upload: {} created, {} already existed, {} failed, {} invalid",
        report.count(UploadOutcome::Created),
        report.count(UploadOutcome::AlreadyExists),
        report.count(UploadOutcome::Failed),
        report.count(UploadOutcome::Invalid),
    );
    if !report.current_intents.is_empty() {
        eprintln!("current intents:");
        for name in &report.current_intents {
            eprintln!("  {name}");
        }
    }
    if let Some(path) = report_path {
        let text = serde_json::to_string_pretty(report).context("serialize upload report")?;
        fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
        eprintln!("wrote {}", shown(path));
    }
    Ok(())
}

fn shown(path: &Path) -> String {
    let cwd = env::current_dir().ok();
    display_path(path, cwd.as_deref())
}
