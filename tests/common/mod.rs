//! Shared test infrastructure for integration tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Fixture from tests/fixtures/{name}/ copied into a scratch directory.
pub struct TestFixture {
    pub fixture_dir: PathBuf,
    pub work_dir: TempDir,
}

impl TestFixture {
    /// Load a fixture by name and stage its agent file in a temp dir.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        let fixture_dir = manifest_dir().join("tests/fixtures").join(name);
        if !fixture_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "fixture {} not found",
                fixture_dir.display()
            ));
        }
        let work_dir = TempDir::new()?;
        fs::copy(
            fixture_dir.join("agent.yaml"),
            work_dir.path().join("agent.yaml"),
        )?;
        Ok(Self {
            fixture_dir,
            work_dir,
        })
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.work_dir.path().join(relative)
    }

    /// Command line for the mock oracle replaying this fixture's response.
    #[allow(dead_code)]
    pub fn mock_oracle_command(&self) -> String {
        let script = manifest_dir().join("tests/mock-oracle.sh");
        shell_words::join([
            "sh".to_string(),
            script.display().to_string(),
            self.fixture_dir.display().to_string(),
        ])
    }

    /// Write a config.yaml wired to the mock oracle.
    #[allow(dead_code)]
    pub fn write_config(&self, phrases: usize) -> anyhow::Result<PathBuf> {
        let config = serde_json::json!({
            "agent_config": {
                "original_file": "agent.yaml",
                "enriched_file": "agent.enriched.yaml",
            },
            "gemini_enrichment": {
                "enabled": true,
                "phrases_to_generate": phrases,
                "command": self.mock_oracle_command(),
                "log_file": "oracle.jsonl",
            },
            "dialogflow": {
                "agent_path": "projects/demo/locations/global/agents/1234",
            },
        });
        let path = self.path("config.yaml");
        fs::write(&path, serde_yaml::to_string(&config)?)?;
        Ok(path)
    }
}

/// Run the built `dseed` binary from `cwd`.
pub fn run_dseed(cwd: &Path, args: &[&str]) -> anyhow::Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_dseed"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .env_remove("GEMINI_API_KEY")
        .env_remove("DIALOGFLOW_ACCESS_TOKEN")
        .output()?;
    Ok(output)
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
