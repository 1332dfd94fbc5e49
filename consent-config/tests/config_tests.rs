use std::fs;

use consent_config::{
    CONFIG_FILE_NAME, Config, ConfigError, LogLevel, SCENARIOS_DIR_NAME, discover_scenarios,
    resolve_scenario,
};
use tempfile::TempDir;

fn write_scenario(dir: &TempDir, file: &str, content: &str) {
    let scenarios = dir.path().join(SCENARIOS_DIR_NAME);
    fs::create_dir_all(&scenarios).expect("Failed to create scenarios dir");
    fs::write(scenarios.join(file), content).expect("Failed to write scenario");
}

#[test]
fn test_first_load_creates_default_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let config = Config::load_from_dir(temp_dir.path()).unwrap();

    assert_eq!(config, Config::default());
    assert!(temp_dir.path().join(CONFIG_FILE_NAME).exists());
    // The temp file from the atomic save must not linger.
    assert!(!temp_dir.path().join("config.yaml.tmp").exists());
}

#[test]
fn test_save_then_load_keeps_changes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.log_level = LogLevel::Trace;
    config.result_timeout_ms = 250;
    config.open_settings_on_permanent_denial = false;

    config
        .save_to(&temp_dir.path().join(CONFIG_FILE_NAME))
        .unwrap();
    let loaded = Config::load_from_dir(temp_dir.path()).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_yaml_is_a_parse_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "log_level: [not, a, level",
    )
    .unwrap();

    let err = Config::load_from_dir(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
}

#[test]
fn test_explicit_config_file_must_exist() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let err = Config::load_file(&temp_dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[cfg(unix)]
#[test]
fn test_symlink_outside_config_dir_is_rejected() {
    let outside = TempDir::new().expect("Failed to create temp dir");
    let config_dir = TempDir::new().expect("Failed to create temp dir");
    let target = outside.path().join("elsewhere.yaml");
    fs::write(&target, "log_level: info\n").unwrap();
    std::os::unix::fs::symlink(&target, config_dir.path().join(CONFIG_FILE_NAME)).unwrap();

    let err = Config::load_from_dir(config_dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::PathTraversal(_)), "got {err:?}");
}

#[test]
fn test_user_scenario_overrides_embedded_identity() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_scenario(
        &temp_dir,
        "granted.toml",
        r#"
identity = "granted-by-host"
description = "overridden"
capabilities = ["camera"]
expected_handler = "denied"
rationale = ["camera"]
"#,
    );

    let scenarios = discover_scenarios(temp_dir.path());
    let matching: Vec<_> = scenarios
        .iter()
        .filter(|s| s.identity == "granted-by-host")
        .collect();

    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].description, "overridden");
}

#[test]
fn test_inactive_and_invalid_scenarios_are_dropped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_scenario(
        &temp_dir,
        "off.toml",
        r#"
identity = "already-granted"
capabilities = ["location.coarse"]
active = false
"#,
    );
    write_scenario(
        &temp_dir,
        "bad.toml",
        r#"
identity = "bad-list"
capabilities = ["camera"]
granted = ["microphone"]
"#,
    );
    write_scenario(&temp_dir, "broken.toml", "identity = ");

    let scenarios = discover_scenarios(temp_dir.path());
    let identities: Vec<&str> = scenarios.iter().map(|s| s.identity.as_str()).collect();

    assert!(!identities.contains(&"already-granted"));
    assert!(!identities.contains(&"bad-list"));
    assert!(identities.contains(&"permanently-denied"));
}

#[test]
fn test_resolve_by_identity_and_by_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let by_identity = resolve_scenario("prompt-declined", temp_dir.path()).unwrap();
    assert!(by_identity.prompt.is_some());

    let path = temp_dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
identity = "custom"
capabilities = ["camera"]
"#,
    )
    .unwrap();
    let by_path = resolve_scenario(path.to_str().unwrap(), temp_dir.path()).unwrap();
    assert_eq!(by_path.identity, "custom");

    let missing = resolve_scenario("no-such-scenario", temp_dir.path()).unwrap_err();
    assert!(matches!(missing, ConfigError::NotFound(_)));
}

#[test]
fn test_broken_scenario_file_reports_its_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "capabilities = 3").unwrap();

    match resolve_scenario(path.to_str().unwrap(), temp_dir.path()) {
        Err(ConfigError::Scenario { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected scenario parse error, got {other:?}"),
    }
}
