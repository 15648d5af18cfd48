//! Configuration tests
//!
//! Guards that every field written by `to_toml()` parses back and that the
//! env > file > default precedence holds.

use super::*;
use crate::model::Role;
use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn no_env() -> impl Fn(&str) -> Option<String> {
    |_| None
}

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip tests
// ─────────────────────────────────────────────────────────────────────────────

/// Verify that the serialized default config can be parsed back.
#[test]
fn test_config_roundtrip_default() {
    let config = Config::default();
    let toml_str = config.to_toml();

    let parsed: Result<FileConfig, _> = toml::from_str(&toml_str);
    assert!(
        parsed.is_ok(),
        "Default config should round-trip.\nTOML:\n{}\nError: {:?}",
        toml_str,
        parsed.err()
    );
}

/// Every field survives to_toml() -> parse -> resolve
#[test]
fn test_config_roundtrip_preserves_values() {
    let mut config = Config::default();
    config.db_path = PathBuf::from("/var/lib/luma/chat.db");
    config.theme = "light".to_string();
    config.operator = OperatorConfig {
        id: "adv-7".to_string(),
        role: Role::OfficeAdmin,
        office_id: Some("office-sp".to_string()),
    };
    config.assistant.provider = AssistantProvider::OpenAi;
    config.assistant.model = "gpt-4.1".to_string();
    config.assistant.max_history = 8;
    config.ui.composer_max_lines = 10;
    config.logging.file_enabled = true;
    config.logging.file_rotation = LogRotation::Hourly;

    let parsed: FileConfig = toml::from_str(&config.to_toml()).expect("valid TOML");
    let resolved = Config::resolve(parsed, no_env());

    assert_eq!(resolved.db_path, config.db_path);
    assert_eq!(resolved.theme, "light");
    assert_eq!(resolved.operator, config.operator);
    assert_eq!(resolved.assistant.provider, AssistantProvider::OpenAi);
    assert_eq!(resolved.assistant.model, "gpt-4.1");
    assert_eq!(resolved.assistant.max_history, 8);
    assert_eq!(resolved.ui, config.ui);
    assert!(resolved.logging.file_enabled);
    assert_eq!(resolved.logging.file_rotation, LogRotation::Hourly);
}

/// Quotes and backslashes in values must not break the TOML
#[test]
fn test_config_escapes_strings() {
    let mut config = Config::default();
    config.operator.id = r#"weird "id" \ here"#.to_string();

    let parsed: FileConfig = toml::from_str(&config.to_toml()).expect("valid TOML");
    let resolved = Config::resolve(parsed, no_env());
    assert_eq!(resolved.operator.id, config.operator.id);
}

/// The API key is never written out, even when set
#[test]
fn test_api_key_not_serialized() {
    let mut config = Config::default();
    config.assistant.api_key = Some("sk-secret".to_string());
    assert!(!config.to_toml().contains("sk-secret"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Precedence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file() {
    let file: FileConfig = toml::from_str(
        r#"
        db_path = "file.db"
        theme = "light"

        [operator]
        id = "file-op"
        role = "ADVISOR"

        [assistant]
        api_key = "file-key"
        "#,
    )
    .unwrap();

    let env = env_from(&[
        ("LUMA_DB_PATH", "env.db"),
        ("LUMA_OPERATOR_ROLE", "admin"),
        ("LUMA_ASSISTANT_API_KEY", "env-key"),
        ("LUMA_DEMO", "1"),
    ]);
    let config = Config::resolve(file, env);

    assert_eq!(config.db_path, PathBuf::from("env.db"));
    assert_eq!(config.theme, "light");
    assert_eq!(config.operator.id, "file-op");
    assert_eq!(config.operator.role, Role::Admin);
    assert_eq!(config.assistant.api_key.as_deref(), Some("env-key"));
    assert!(config.demo_mode);
}

#[test]
fn test_defaults_when_empty() {
    let config = Config::resolve(FileConfig::default(), no_env());
    let defaults = Config::default();

    assert_eq!(config.db_path, defaults.db_path);
    assert_eq!(config.operator, defaults.operator);
    assert_eq!(config.assistant.provider, AssistantProvider::Scripted);
    assert!(!config.demo_mode);
}

#[test]
fn test_ui_bounds_are_normalized() {
    let ui = UiConfig::from_file(Some(FileUi {
        composer_min_lines: Some(0),
        composer_max_lines: Some(0),
        toast_secs: None,
        tick_ms: Some(1),
    }));
    assert_eq!(ui.composer_min_lines, 1);
    assert_eq!(ui.composer_max_lines, 1);
    assert_eq!(ui.tick_ms, 16);
}

#[test]
fn test_log_rotation_parsing() {
    assert_eq!(LogRotation::parse("HOURLY"), LogRotation::Hourly);
    assert_eq!(LogRotation::parse("never"), LogRotation::Never);
    assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
}
