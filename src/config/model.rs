// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::HealthFailureStrategy;

/// Paths whose change forces a rebuild when `[build].watch` is not set.
pub const DEFAULT_WATCH: &[&str] = &[
    "requirements.txt",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
];

/// Configuration as read from `Rollout.toml`, before validation.
///
/// ```toml
/// [service]
/// name = "pdf-api"
/// port = 5001
/// env_file = ".env"
///
/// [build]
/// artifact = "pdf-api:latest"
/// watch = ["requirements.txt", "Dockerfile"]
///
/// [health]
/// endpoint = "http://127.0.0.1:5001/health"
/// max_attempts = 5
/// ```
///
/// Required keys are `Option`s here so that a missing one can be reported
/// as `ConfigMissing` instead of a TOML error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub service: RawServiceSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub build: RawBuildSection,
    #[serde(default)]
    pub health: RawHealthSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub rollout: RolloutSection,
}

/// `[service]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServiceSection {
    /// Container name; also keys the run lock.
    pub name: Option<String>,
    /// Host port the service is published on.
    pub port: Option<u16>,
    /// Port inside the container; defaults to `port`.
    #[serde(default)]
    pub container_port: Option<u16>,
    /// Env file passed to the runtime. Must exist when set.
    #[serde(default)]
    pub env_file: Option<PathBuf>,
}

/// `[source]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default = "default_dot")]
    pub root: PathBuf,
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            root: default_dot(),
            remote: default_remote(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuildSection {
    /// Stable image name, overwritten in place on rebuild.
    pub artifact: Option<String>,
    #[serde(default = "default_dot")]
    pub context: PathBuf,
    #[serde(default)]
    pub dockerfile: Option<PathBuf>,
    #[serde(default = "default_watch")]
    pub watch: Vec<String>,
}

impl Default for RawBuildSection {
    fn default() -> Self {
        Self {
            artifact: None,
            context: default_dot(),
            dockerfile: None,
            watch: default_watch(),
        }
    }
}

/// `[health]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHealthSection {
    /// Defaults to `http://127.0.0.1:<service.port>/health`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_initial_delay_seconds")]
    pub initial_delay_seconds: u64,
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

impl Default for RawHealthSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_attempts: default_max_attempts(),
            interval_seconds: default_interval_seconds(),
            initial_delay_seconds: default_initial_delay_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Container CLI used for both builds and the service runtime.
    #[serde(default = "default_runtime_bin")]
    pub bin: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            bin: default_runtime_bin(),
        }
    }
}

/// `[rollout]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolloutSection {
    #[serde(default)]
    pub on_health_failure: HealthFailureStrategy,
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    /// Shell command run when a run fails.
    #[serde(default)]
    pub alert_cmd: Option<String>,
}

impl Default for RolloutSection {
    fn default() -> Self {
        Self {
            on_health_failure: HealthFailureStrategy::default(),
            lock_dir: default_lock_dir(),
            alert_cmd: None,
        }
    }
}

fn default_dot() -> PathBuf {
    PathBuf::from(".")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_watch() -> Vec<String> {
    DEFAULT_WATCH.iter().map(|s| s.to_string()).collect()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_interval_seconds() -> u64 {
    5
}

fn default_initial_delay_seconds() -> u64 {
    10
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_runtime_bin() -> String {
    "docker".to_string()
}

fn default_lock_dir() -> PathBuf {
    PathBuf::from(".rollout")
}

/// `[service]` after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub port: u16,
    pub container_port: u16,
    pub env_file: Option<PathBuf>,
}

/// `[build]` after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub artifact: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub watch: Vec<String>,
}

/// `[health]` after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    pub endpoint: String,
    pub max_attempts: u32,
    pub interval_seconds: u64,
    pub initial_delay_seconds: u64,
    pub probe_timeout_seconds: u64,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so every required key is present and every value is usable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub service: ServiceConfig,
    pub source: SourceSection,
    pub build: BuildConfig,
    pub health: HealthConfig,
    pub runtime: RuntimeSection,
    pub rollout: RolloutSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        service: ServiceConfig,
        source: SourceSection,
        build: BuildConfig,
        health: HealthConfig,
        runtime: RuntimeSection,
        rollout: RolloutSection,
    ) -> Self {
        Self {
            service,
            source,
            build,
            health,
            runtime,
            rollout,
        }
    }

    /// Resolve every relative path in the config against `base` (normally
    /// the directory holding the config file).
    pub fn rooted_at(mut self, base: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.source.root = join(&self.source.root);
        self.build.context = join(&self.build.context);
        self.build.dockerfile = self.build.dockerfile.as_deref().map(join);
        self.service.env_file = self.service.env_file.as_deref().map(join);
        self.rollout.lock_dir = join(&self.rollout.lock_dir);
        self
    }
}
