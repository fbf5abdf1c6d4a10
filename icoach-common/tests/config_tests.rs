//! Integration tests for TOML configuration loading and graceful degradation

use icoach_common::config::{load_or_default, load_toml_config, TomlConfig};
use icoach_common::Error;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_empty_toml_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("icoach-live.toml");
    std::fs::write(&path, "").unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.worker_pool.size, 3);
    assert_eq!(config.segmenter.silence_run_limit, 3);
    assert_eq!(config.segmenter.speech_threshold_db, -40.0);
    assert_eq!(config.dialogue.resume_quota, 2);
}

#[test]
fn test_partial_toml_overrides_only_given_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("icoach-live.toml");
    std::fs::write(
        &path,
        r#"
questions_path = "/srv/icoach/questions.json"

[server]
bind = "0.0.0.0:9000"

[worker_pool]
size = 6

[segmenter]
silence_run_limit = 5

[scoring]
non_verbal = 0.5
vocal = 0.1
keyword = 0.4

[providers.llm]
api_key = "test-key"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.worker_pool.size, 6);
    assert_eq!(config.segmenter.silence_run_limit, 5);
    assert_eq!(config.segmenter.max_buffer_samples, 480_000);
    assert_eq!(config.scoring.non_verbal, 0.5);
    assert_eq!(config.providers.llm.api_key.as_deref(), Some("test-key"));
    assert_eq!(config.providers.llm.model, "llama3-8b-8192");
    assert_eq!(
        config.questions_path,
        Some(PathBuf::from("/srv/icoach/questions.json"))
    );
}

#[test]
fn test_invalid_weights_rejected_at_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("icoach-live.toml");
    std::fs::write(
        &path,
        "[scoring]\nnon_verbal = 0.6\nvocal = 0.6\nkeyword = 0.4\n",
    )
    .unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("icoach-live.toml");
    std::fs::write(&path, "[server\nbind = ").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_explicit_missing_path_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    assert!(load_or_default(Some(&missing), "icoach-live").is_err());
}

#[test]
fn test_missing_default_path_falls_back_to_defaults() {
    // A module name nobody configures resolves to a path that does not exist
    let config = load_or_default(None, "icoach-test-module-without-config").unwrap();
    assert_eq!(config, TomlConfig::default());
}
