// tests/config_loading.rs
mod common;
use crate::common::TestResult;
use crate::common::builders::ConfigFileBuilder;

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rollout::config::{DEFAULT_WATCH, load_and_validate, validate_environment};
use rollout::engine::RunPlan;
use rollout::errors::RolloutError;
use rollout::types::HealthFailureStrategy;

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("Rollout.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn demo_config_loads_and_plans() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let demos = manifest.join("demos");
    let cfg = load_and_validate(demos.join("Rollout.toml"))?.rooted_at(&demos);

    assert_eq!(cfg.service.name, "pdf-api");
    assert_eq!(cfg.service.port, 5001);
    assert_eq!(cfg.health.endpoint, "http://127.0.0.1:5001/health");
    assert_eq!(cfg.rollout.on_health_failure, HealthFailureStrategy::AlertOnly);
    assert_eq!(cfg.source.root, demos.join(".."));
    assert_eq!(cfg.rollout.lock_dir, demos.join(".rollout"));

    let plan = RunPlan::from_config(&cfg)?;
    assert!(plan.watched.matches("requirements.txt"));
    assert!(!plan.watched.matches("app.py"));
    Ok(())
}

#[test]
fn minimal_config_gets_documented_defaults() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_config(
        tmp.path(),
        r#"
[service]
name = "pdf-api"
port = 5001

[build]
artifact = "pdf-api:latest"
"#,
    );

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.service.container_port, 5001);
    assert_eq!(cfg.health.endpoint, "http://127.0.0.1:5001/health");
    assert_eq!(cfg.health.max_attempts, 5);
    assert_eq!(cfg.health.interval_seconds, 5);
    assert_eq!(cfg.health.initial_delay_seconds, 10);
    assert_eq!(cfg.health.probe_timeout_seconds, 5);
    assert_eq!(cfg.build.watch, DEFAULT_WATCH);
    assert_eq!(cfg.source.remote, "origin");
    assert_eq!(cfg.runtime.bin, "docker");
    assert_eq!(cfg.rollout.on_health_failure, HealthFailureStrategy::AlertOnly);
    assert!(cfg.rollout.alert_cmd.is_none());
    Ok(())
}

#[test]
fn missing_file_is_config_missing() {
    let tmp = TempDir::new().unwrap();
    let err = load_and_validate(tmp.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, RolloutError::ConfigMissing(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_required_keys_are_named() {
    let tmp = TempDir::new().unwrap();

    let path = write_config(tmp.path(), "[service]\nname = \"api\"\n[build]\nartifact = \"api\"\n");
    match load_and_validate(&path) {
        Err(RolloutError::ConfigMissing(key)) => assert_eq!(key, "service.port"),
        other => panic!("expected ConfigMissing, got {other:?}"),
    }

    let path = write_config(tmp.path(), "[service]\nname = \"api\"\nport = 8080\n");
    match load_and_validate(&path) {
        Err(RolloutError::ConfigMissing(key)) => assert_eq!(key, "build.artifact"),
        other => panic!("expected ConfigMissing, got {other:?}"),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        "[service]\nname = \"api\"\nport = 8080\nreplicas = 2\n[build]\nartifact = \"api\"\n",
    );
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, RolloutError::TomlError(_)));
}

#[test]
fn invalid_values_are_config_errors() {
    let bad = [
        ConfigFileBuilder::new().with_health(0, 5, 10).raw(),
        ConfigFileBuilder::new().with_artifact("pdf api").raw(),
        ConfigFileBuilder::new().with_watch(&["src/[oops"]).raw(),
        {
            let mut raw = ConfigFileBuilder::new().raw();
            raw.health.endpoint = Some("ftp://127.0.0.1/health".to_string());
            raw
        },
        {
            let mut raw = ConfigFileBuilder::new().raw();
            raw.health.endpoint = Some("not a url".to_string());
            raw
        },
    ];

    for raw in bad {
        let err = rollout::config::ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, RolloutError::ConfigError(_)), "{err}");
    }
}

#[test]
fn strategy_is_read_from_toml() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_config(
        tmp.path(),
        r#"
[service]
name = "api"
port = 8080

[build]
artifact = "api:latest"

[rollout]
on_health_failure = "auto_rollback"
alert_cmd = "logger -t rollout failed"
"#,
    );

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.rollout.on_health_failure, HealthFailureStrategy::AutoRollback);
    assert_eq!(cfg.rollout.alert_cmd.as_deref(), Some("logger -t rollout failed"));
    Ok(())
}

#[test]
fn missing_env_file_fails_environment_check() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_config(
        tmp.path(),
        r#"
[service]
name = "api"
port = 8080
env_file = ".env"

[build]
artifact = "api:latest"
"#,
    );
    let cfg = load_and_validate(&path)?.rooted_at(tmp.path());

    let err = validate_environment(&cfg).unwrap_err();
    assert!(matches!(err, RolloutError::ConfigMissing(_)));

    fs::write(tmp.path().join(".env"), "FLASK_ENV=production\n")?;
    validate_environment(&cfg)?;
    Ok(())
}

#[tokio::test]
async fn dry_run_validates_without_touching_anything() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let args = rollout::cli::CliArgs {
        config: manifest.join("demos/Rollout.toml").display().to_string(),
        log_level: None,
        dry_run: true,
        on_health_failure: Some(HealthFailureStrategy::AutoRollback),
    };

    assert_eq!(rollout::run(args).await?, 0);
    assert!(!manifest.join("demos/.rollout").exists());
    Ok(())
}

#[tokio::test]
async fn run_with_missing_config_reports_config_missing() {
    let tmp = TempDir::new().unwrap();
    let args = rollout::cli::CliArgs {
        config: tmp.path().join("Rollout.toml").display().to_string(),
        log_level: None,
        dry_run: false,
        on_health_failure: None,
    };

    let err = rollout::run(args).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
