// src/build/docker.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::types::BoxFuture;

use super::Builder;

/// Builds container images with `docker build` (or a compatible CLI such as
/// `podman`).
pub struct DockerBuilder {
    runner: Arc<dyn CommandRunner>,
    bin: String,
    context: PathBuf,
    dockerfile: Option<PathBuf>,
}

impl DockerBuilder {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        bin: impl Into<String>,
        context: impl Into<PathBuf>,
        dockerfile: Option<PathBuf>,
    ) -> Self {
        Self {
            runner,
            bin: bin.into(),
            context: context.into(),
            dockerfile,
        }
    }

    fn build_spec(&self, artifact: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.bin).args(["build", "-t", artifact]);
        if let Some(file) = &self.dockerfile {
            spec = spec.arg("-f").arg(file.to_string_lossy());
        }
        spec.arg(self.context.to_string_lossy())
    }

    async fn tag(&self, from: &str, to: &str) -> Result<()> {
        let spec = CommandSpec::new(&self.bin).args(["tag", from, to]);
        let out = self.runner.run(&spec).await?;
        if !out.success() {
            return Err(anyhow!("`{spec}` failed ({}): {}", out.code, out.combined()).into());
        }
        Ok(())
    }
}

impl Builder for DockerBuilder {
    fn build<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let spec = self.build_spec(artifact);
            let out = self.runner.run(&spec).await?;
            if !out.success() {
                return Err(BuildError::ToolchainFailure {
                    artifact: artifact.to_string(),
                    code: out.code,
                    log: out.combined(),
                }
                .into());
            }
            Ok(())
        })
    }

    fn preserve<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let inspect = CommandSpec::new(&self.bin).args(["image", "inspect", artifact]);
            let out = self.runner.run(&inspect).await?;
            if !out.success() {
                debug!(artifact, "no existing image to preserve");
                return Ok(false);
            }
            let backup = rollback_reference(artifact);
            self.tag(artifact, &backup).await?;
            info!(artifact, backup = %backup, "previous image preserved");
            Ok(true)
        })
    }

    fn restore<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let backup = rollback_reference(artifact);
            self.tag(&backup, artifact).await?;
            info!(artifact, backup = %backup, "previous image restored");
            Ok(())
        })
    }
}

/// Image reference the previous build is kept under.
///
/// `api:latest` becomes `api:latest-rollback`; an untagged `registry:5000/api`
/// becomes `registry:5000/api:rollback`.
pub fn rollback_reference(artifact: &str) -> String {
    let name_start = artifact.rfind('/').map(|i| i + 1).unwrap_or(0);
    if artifact[name_start..].contains(':') {
        format!("{artifact}-rollback")
    } else {
        format!("{artifact}:rollback")
    }
}
