// src/build/mod.rs

//! Artifact builds.
//!
//! The orchestrator only calls into this module when the change set was
//! classified as [`RebuildDecision::RebuildAndRestart`]. A failed build is
//! fatal to the run and leaves the previous artifact in place.
//!
//! [`RebuildDecision::RebuildAndRestart`]: crate::types::RebuildDecision

pub mod docker;

use std::time::Instant;

use tracing::{error, info};

use crate::errors::{BuildError, Result, RolloutError};
use crate::types::BoxFuture;

pub use docker::{DockerBuilder, rollback_reference};

/// Narrow contract over the build toolchain.
pub trait Builder: Send + Sync {
    /// Build `artifact` in place. Running it twice on unchanged inputs must
    /// produce an equivalent artifact.
    fn build<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Keep a copy of the current `artifact` so it can be restored later.
    /// Returns `false` when there is nothing to preserve yet.
    fn preserve<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Point `artifact` back at the copy made by [`Builder::preserve`].
    fn restore<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Build the artifact, logging the toolchain output on failure.
pub async fn execute_build(builder: &dyn Builder, artifact: &str) -> Result<()> {
    info!(artifact, "building artifact");
    let started = Instant::now();

    match builder.build(artifact).await {
        Ok(()) => {
            info!(
                artifact,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "artifact built"
            );
            Ok(())
        }
        Err(RolloutError::Build(BuildError::ToolchainFailure {
            artifact: name,
            code,
            log,
        })) => {
            error!(artifact = %name, exit_code = code, "build failed");
            // Tail only; the full log stays in the error.
            let lines: Vec<&str> = log.lines().collect();
            for line in &lines[lines.len().saturating_sub(20)..] {
                error!(artifact = %name, "build: {}", line);
            }
            Err(BuildError::ToolchainFailure {
                artifact: name,
                code,
                log,
            }
            .into())
        }
        Err(other) => {
            error!(artifact, error = %other, "could not run build toolchain");
            Err(BuildError::ToolchainFailure {
                artifact: artifact.to_string(),
                code: -1,
                log: other.to_string(),
            }
            .into())
        }
    }
}
