//! CLI argument parsing for the enrich-and-upload workflow.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "dseed",
    version,
    about = "Generate, tag, and upload conversational agent training data",
    after_help = "Commands:\n  init                 Write a starter config.yaml\n  enrich               Generate and tag training phrases (writes the enriched agent file)\n  upload               Create entity types and intents on the agent\n  run                  Enrich (when enabled) and upload in one pass\n  tag                  Tag phrases against an agent file's entities\n  list                 List the agent's current intents\n\nExamples:\n  dseed init\n  dseed enrich --config config.yaml\n  dseed upload --report upload.json\n  dseed tag --agent-file agent.yaml \"book a flight to new york\"",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Enrich(EnrichArgs),
    Upload(UploadArgs),
    Run(RunArgs),
    Tag(TagArgs),
    List(ListArgs),
}

/// Location of the run configuration, shared by most commands.
#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Run configuration (YAML)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Write a starter run configuration")]
pub struct InitArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Generate and tag new training phrases for every intent")]
pub struct EnrichArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Output path (defaults to agent_config.enriched_file)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Append oracle call records here (overrides the config's log_file)
    #[arg(long, value_name = "PATH")]
    pub lm_log: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Create entity types and intents on the remote agent")]
pub struct UploadArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Agent file to upload (defaults to the enriched file when it exists)
    #[arg(long, value_name = "PATH")]
    pub agent_file: Option<PathBuf>,

    /// Write the machine-readable upload report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Enrich (when enabled) and upload in one pass")]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Write the machine-readable upload report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Tag phrases against the entities of an agent file")]
pub struct TagArgs {
    /// Agent file providing the entity catalog
    #[arg(long, value_name = "PATH")]
    pub agent_file: PathBuf,

    /// Emit JSON instead of YAML
    #[arg(long)]
    pub json: bool,

    /// Phrases to tag
    #[arg(required = true, value_name = "PHRASE")]
    pub phrases: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "List the remote agent's current intents")]
pub struct ListArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_with_global_verbose() {
        let args = RootArgs::try_parse_from([
            "dseed",
            "tag",
            "--agent-file",
            "agent.yaml",
            "--json",
            "red car",
            "--verbose",
        ])
        .expect("parse");
        assert!(args.verbose);
        let Command::Tag(tag) = args.command else {
            panic!("expected tag command");
        };
        assert!(tag.json);
        assert_eq!(tag.phrases, vec!["red car".to_string()]);
    }

    #[test]
    fn config_defaults_to_local_file() {
        let args = RootArgs::try_parse_from(["dseed", "upload"]).expect("parse");
        let Command::Upload(upload) = args.command else {
            panic!("expected upload command");
        };
        assert_eq!(upload.config.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(upload.agent_file.is_none());
    }

    #[test]
    fn tag_requires_a_phrase() {
        assert!(RootArgs::try_parse_from(["dseed", "tag", "--agent-file", "a.yaml"]).is_err());
    }
}
