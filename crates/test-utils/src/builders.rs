#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use rollout::classify::WatchedPaths;
use rollout::config::{ConfigFile, RawConfigFile};
use rollout::engine::RunPlan;
use rollout::errors::RolloutError;
use rollout::types::HealthFailureStrategy;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a minimal valid config: service `api` on port 5001, image
/// `api:latest`, default watch list and health policy.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.service.name = Some("api".to_string());
        config.service.port = Some(5001);
        config.build.artifact = Some("api:latest".to_string());
        Self { config }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.config.service.name = Some(name.to_string());
        self
    }

    pub fn with_artifact(mut self, artifact: &str) -> Self {
        self.config.build.artifact = Some(artifact.to_string());
        self
    }

    pub fn with_watch(mut self, patterns: &[&str]) -> Self {
        self.config.build.watch = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.source.root = root.into();
        self
    }

    pub fn with_lock_dir(mut self, dir: &Path) -> Self {
        self.config.rollout.lock_dir = dir.to_path_buf();
        self
    }

    pub fn with_strategy(mut self, strategy: HealthFailureStrategy) -> Self {
        self.config.rollout.on_health_failure = strategy;
        self
    }

    pub fn with_health(mut self, max_attempts: u32, interval_seconds: u64, initial_delay_seconds: u64) -> Self {
        self.config.health.max_attempts = max_attempts;
        self.config.health.interval_seconds = interval_seconds;
        self.config.health.initial_delay_seconds = initial_delay_seconds;
        self
    }

    pub fn with_alert_cmd(mut self, cmd: &str) -> Self {
        self.config.rollout.alert_cmd = Some(cmd.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile, RolloutError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build ConfigFile")
    }

    /// Shortcut for the common case: validated config straight into a plan.
    pub fn plan(self) -> RunPlan {
        RunPlan::from_config(&self.build()).expect("Failed to build RunPlan")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn watched(patterns: &[&str]) -> WatchedPaths {
    WatchedPaths::new(patterns.iter().copied()).expect("valid watch patterns")
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
