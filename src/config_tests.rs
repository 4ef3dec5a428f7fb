use super::*;

const FULL_CONFIG: &str = r#"
agent_config:
  original_file: agent.yaml
  enriched_file: out/agent.enriched.yaml
gemini_enrichment:
  enabled: true
  api_key: " secret "
  phrases_to_generate: 5
dialogflow:
  agent_path: projects/demo/locations/europe-west1/agents/abc-123
"#;

fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn loads_and_validates_full_config() {
    let (_dir, path) = write_temp(FULL_CONFIG);
    let config = load_config(&path).expect("load config");
    validate_config(&config).expect("valid config");
    assert!(config.enrichment.enabled);
    assert_eq!(config.enrichment.phrases_to_generate, 5);
    assert_eq!(
        config.agent_config.enriched_file.as_deref(),
        Some(Path::new("out/agent.enriched.yaml"))
    );
    assert_eq!(
        resolve_oracle(&config.enrichment).expect("oracle"),
        OracleSelection::Gemini {
            api_key: "secret".to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    );
}

#[test]
fn enrichment_section_is_optional() {
    let (_dir, path) = write_temp(
        "agent_config:\n  original_file: agent.yaml\ndialogflow:\n  agent_path: projects/p/locations/global/agents/a\n",
    );
    let config = load_config(&path).expect("load config");
    validate_config(&config).expect("valid config");
    assert!(!config.enrichment.enabled);
    assert_eq!(config.enrichment.phrases_to_generate, 10);
}

#[test]
fn empty_config_file_is_rejected() {
    let (_dir, path) = write_temp("\n\n");
    let err = load_config(&path).expect_err("empty config");
    assert!(err.to_string().contains("is empty"), "{err:#}");
}

#[test]
fn missing_config_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nope.yaml");
    let err = load_config(&path).expect_err("missing config");
    assert!(format!("{err:#}").contains("nope.yaml"));
}

#[test]
fn unknown_keys_are_rejected() {
    let (_dir, path) = write_temp(&format!("{FULL_CONFIG}extra_section: true\n"));
    assert!(load_config(&path).is_err());
}

#[test]
fn enabled_enrichment_requires_enriched_file() {
    let mut config = default_config();
    config.dialogflow.agent_path = "projects/p/locations/global/agents/a".to_string();
    config.enrichment.enabled = true;
    config.agent_config.enriched_file = None;
    let err = validate_config(&config).expect_err("missing enriched file");
    assert!(err.to_string().contains("enriched_file"));
}

#[test]
fn enrichment_checks_ignore_dialogflow_section() {
    let mut config = default_config();
    config.agent_config.enriched_file = None;
    validate_enrichment(&config).expect("placeholder agent path is fine for enrichment");

    config.enrichment.phrases_to_generate = 0;
    let err = validate_enrichment(&config).expect_err("zero phrases");
    assert!(err.to_string().contains("phrases_to_generate"));
}

#[test]
fn stub_agent_path_must_be_edited() {
    let err = validate_config(&default_config()).expect_err("placeholder agent path");
    assert!(err.to_string().contains("agent_path"));
}

#[test]
fn command_oracle_wins_over_gemini() {
    let settings = EnrichmentSettings {
        enabled: true,
        api_key: Some("key".to_string()),
        command: Some("  llm -m local  ".to_string()),
        ..EnrichmentSettings::default()
    };
    assert_eq!(
        resolve_oracle(&settings).expect("oracle"),
        OracleSelection::Command("llm -m local".to_string())
    );
}

#[test]
fn missing_api_key_is_an_error() {
    if std::env::var_os(GEMINI_API_KEY_ENV).is_some() {
        return;
    }
    let settings = EnrichmentSettings {
        enabled: true,
        api_key: Some("   ".to_string()),
        ..EnrichmentSettings::default()
    };
    let err = resolve_oracle(&settings).expect_err("missing key");
    assert!(err.to_string().contains("cannot be empty"));
}

#[test]
fn parses_agent_paths() {
    let parsed = parse_agent_path("projects/p1/locations/us-central1/agents/a-9").expect("parse");
    assert_eq!(
        parsed,
        AgentPath {
            project: "p1".to_string(),
            location: "us-central1".to_string(),
            agent: "a-9".to_string(),
        }
    );
    assert!(parse_agent_path("projects/p1/agents/a-9").is_err());
    assert!(parse_agent_path("projects//locations/x/agents/a").is_err());
}

#[test]
fn stub_round_trips_through_yaml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/config.yaml");
    write_config(&path, &default_config()).expect("write stub");
    assert_eq!(load_config(&path).expect("load stub"), default_config());
}

#[test]
fn relative_paths_resolve_against_config_dir() {
    let config_path = Path::new("/etc/dseed/config.yaml");
    assert_eq!(
        resolve_relative(config_path, Path::new("agent.yaml")),
        PathBuf::from("/etc/dseed/agent.yaml")
    );
    assert_eq!(
        resolve_relative(config_path, Path::new("/abs/agent.yaml")),
        PathBuf::from("/abs/agent.yaml")
    );
    assert_eq!(
        resolve_relative(Path::new("config.yaml"), Path::new("agent.yaml")),
        PathBuf::from("agent.yaml")
    );
}
