use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod agent;
mod backend;
mod cli;
mod config;
mod dialogflow;
mod enrich;
mod oracle;
mod oracle_log;
mod tagging;
#[cfg(test)]
mod test_support;
mod upload;
mod util;
mod workflow;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        cli::Command::Init(args) => workflow::run_init(args),
        cli::Command::Enrich(args) => workflow::run_enrich(args),
        cli::Command::Upload(args) => workflow::run_upload(args),
        cli::Command::Run(args) => workflow::run_full(args),
        cli::Command::Tag(args) => workflow::run_tag(args),
        cli::Command::List(args) => workflow::run_list(args),
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
