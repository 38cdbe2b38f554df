// src/config/validate.rs

use crate::classify::WatchedPaths;
use crate::config::model::{
    BuildConfig, ConfigFile, HealthConfig, RawConfigFile, ServiceConfig,
};
use crate::errors::{Result, RolloutError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RolloutError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let service = validate_service(&raw)?;
        let build = validate_build(&raw)?;
        let health = validate_health(&raw, service.port)?;
        validate_rollout(&raw)?;
        Ok(ConfigFile::new_unchecked(
            service,
            raw.source,
            build,
            health,
            raw.runtime,
            raw.rollout,
        ))
    }
}

/// Checks that need the filesystem, run right before a real deployment.
///
/// A configured env file that does not exist is `ConfigMissing`: starting
/// the service without it would run it with undefined settings.
pub fn validate_environment(cfg: &ConfigFile) -> Result<()> {
    if let Some(env_file) = &cfg.service.env_file {
        if !env_file.is_file() {
            return Err(RolloutError::ConfigMissing(format!(
                "env file {} (service.env_file) does not exist",
                env_file.display()
            )));
        }
    }
    if !cfg.source.root.is_dir() {
        return Err(RolloutError::ConfigMissing(format!(
            "source root {} (source.root) does not exist",
            cfg.source.root.display()
        )));
    }
    Ok(())
}

fn required<T: Clone>(value: &Option<T>, key: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| RolloutError::ConfigMissing(key.to_string()))
}

fn validate_service(cfg: &RawConfigFile) -> Result<ServiceConfig> {
    let name = required(&cfg.service.name, "service.name")?;
    if name.trim().is_empty() {
        return Err(RolloutError::ConfigMissing("service.name".to_string()));
    }

    let port = required(&cfg.service.port, "service.port")?;
    if port == 0 {
        return Err(RolloutError::ConfigError(
            "[service].port must be >= 1 (got 0)".to_string(),
        ));
    }

    let container_port = cfg.service.container_port.unwrap_or(port);
    if container_port == 0 {
        return Err(RolloutError::ConfigError(
            "[service].container_port must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(ServiceConfig {
        name,
        port,
        container_port,
        env_file: cfg.service.env_file.clone(),
    })
}

fn validate_build(cfg: &RawConfigFile) -> Result<BuildConfig> {
    let artifact = required(&cfg.build.artifact, "build.artifact")?;
    if artifact.trim().is_empty() || artifact.contains(char::is_whitespace) {
        return Err(RolloutError::ConfigError(format!(
            "[build].artifact is not a valid image name: {artifact:?}"
        )));
    }

    WatchedPaths::new(cfg.build.watch.iter().cloned())
        .map_err(|e| RolloutError::ConfigError(format!("[build].watch: {e:#}")))?;

    Ok(BuildConfig {
        artifact,
        context: cfg.build.context.clone(),
        dockerfile: cfg.build.dockerfile.clone(),
        watch: cfg.build.watch.clone(),
    })
}

fn validate_health(cfg: &RawConfigFile, port: u16) -> Result<HealthConfig> {
    let health = &cfg.health;

    if health.max_attempts == 0 {
        return Err(RolloutError::ConfigError(
            "[health].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if health.probe_timeout_seconds == 0 {
        return Err(RolloutError::ConfigError(
            "[health].probe_timeout_seconds must be >= 1 (got 0)".to_string(),
        ));
    }

    let endpoint = health
        .endpoint
        .clone()
        .unwrap_or_else(|| format!("http://127.0.0.1:{port}/health"));
    let url = reqwest::Url::parse(&endpoint).map_err(|e| {
        RolloutError::ConfigError(format!("[health].endpoint {endpoint:?} is not a URL: {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RolloutError::ConfigError(format!(
            "[health].endpoint must be http or https (got {})",
            url.scheme()
        )));
    }

    Ok(HealthConfig {
        endpoint,
        max_attempts: health.max_attempts,
        interval_seconds: health.interval_seconds,
        initial_delay_seconds: health.initial_delay_seconds,
        probe_timeout_seconds: health.probe_timeout_seconds,
    })
}

fn validate_rollout(cfg: &RawConfigFile) -> Result<()> {
    if let Some(cmd) = &cfg.rollout.alert_cmd {
        if cmd.trim().is_empty() {
            return Err(RolloutError::ConfigError(
                "[rollout].alert_cmd must not be empty when set".to_string(),
            ));
        }
    }
    if cfg.source.remote.trim().is_empty() {
        return Err(RolloutError::ConfigError(
            "[source].remote must not be empty".to_string(),
        ));
    }
    Ok(())
}
