// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every component reports failures through [`RolloutError`]. The
//! orchestrator is the only place that turns one of these into a terminal
//! verdict; [`RolloutError::exit_code`] and [`RolloutError::hint`] are what
//! the CLI shows the operator.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::RunState;

/// Failures while bringing the working tree up to date with the remote.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no version-control metadata at {0}")]
    NoVcs(PathBuf),

    #[error("could not integrate remote state: {0}")]
    ConnectivityOrConflict(String),
}

/// The build toolchain exited non-zero.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build of '{artifact}' failed with exit code {code}")]
    ToolchainFailure {
        artifact: String,
        code: i32,
        log: String,
    },
}

#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("failed to stop instance '{name}': {detail}")]
    StopFailed { name: String, detail: String },

    #[error("failed to start instance '{name}': {detail}")]
    StartFailed { name: String, detail: String },
}

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("{endpoint} did not report healthy after {attempts} probe(s)")]
    Unhealthy { endpoint: String, attempts: u32 },
}

#[derive(Error, Debug)]
pub enum RolloutError {
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Switch failed: {0}")]
    Switch(#[from] SwitchError),

    #[error("Health check failed: {0}")]
    Health(#[from] HealthError),

    #[error("Missing required configuration: {0}")]
    ConfigMissing(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Another run already holds the lock for service '{service}' ({})", path.display())]
    ConcurrentRun { service: String, path: PathBuf },

    #[error("Run cancelled before entering {0}")]
    Cancelled(RunState),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RolloutError {
    /// Process exit code for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            RolloutError::ConfigMissing(_)
            | RolloutError::ConfigError(_)
            | RolloutError::TomlError(_) => 2,
            RolloutError::ConcurrentRun { .. } => 3,
            RolloutError::Sync(_) => 10,
            RolloutError::Build(_) => 20,
            RolloutError::Switch(_) => 30,
            RolloutError::Health(_) => 40,
            RolloutError::Cancelled(_) => 50,
            RolloutError::IoError(_) | RolloutError::Other(_) => 1,
        }
    }

    /// What the operator should look at next.
    pub fn hint(&self) -> &'static str {
        match self {
            RolloutError::Sync(SyncError::NoVcs(_)) => {
                "run from a git checkout or point [source].root at one"
            }
            RolloutError::Sync(SyncError::ConnectivityOrConflict(_)) => {
                "check access to the remote and resolve diverged history by hand; \
                 stashed local edits are listed by `git stash list`"
            }
            RolloutError::Build(_) => {
                "inspect the build log; the previous image and running instance were left untouched"
            }
            RolloutError::Switch(SwitchError::StopFailed { .. }) => {
                "inspect the container runtime; the old instance may still be running"
            }
            RolloutError::Switch(SwitchError::StartFailed { .. }) => {
                "inspect runtime logs for the container; nothing is serving the port"
            }
            RolloutError::Health(_) => {
                "service restarted but did not become healthy; inspect runtime logs"
            }
            RolloutError::ConfigMissing(_) | RolloutError::ConfigError(_) => {
                "fix the configuration file and rerun"
            }
            RolloutError::TomlError(_) => "the configuration file is not valid TOML",
            RolloutError::ConcurrentRun { .. } => {
                "wait for the other run to finish before starting a new one"
            }
            RolloutError::Cancelled(_) => "rerun to converge on the latest revision",
            RolloutError::IoError(_) | RolloutError::Other(_) => "see the error above",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RolloutError>;
