// src/switch/docker.rs

use std::sync::Arc;

use crate::errors::{Result, SwitchError};
use crate::exec::{CommandRunner, CommandSpec};
use crate::types::{BoxFuture, InstanceStatus};

use super::{ContainerRuntime, InstanceSpec};

/// `docker` CLI adapter for [`ContainerRuntime`].
pub struct DockerRuntime {
    runner: Arc<dyn CommandRunner>,
    bin: String,
}

impl DockerRuntime {
    pub fn new(runner: Arc<dyn CommandRunner>, bin: impl Into<String>) -> Self {
        Self {
            runner,
            bin: bin.into(),
        }
    }

    fn run_spec(&self, spec: &InstanceSpec) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.bin)
            .args(["run", "-d", "--name"])
            .arg(&spec.name)
            .arg("-p")
            .arg(format!("{}:{}", spec.host_port, spec.container_port))
            .args(["--restart", "unless-stopped"]);
        if let Some(env_file) = &spec.env_file {
            cmd = cmd.arg("--env-file").arg(env_file.to_string_lossy());
        }
        cmd.arg(&spec.artifact)
    }
}

impl ContainerRuntime for DockerRuntime {
    fn stop<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let spec = CommandSpec::new(&self.bin).args(["rm", "-f", name]);
            let out = self.runner.run(&spec).await?;
            if out.success() || is_missing_container(&out.stderr) {
                return Ok(());
            }
            Err(SwitchError::StopFailed {
                name: name.to_string(),
                detail: out.combined(),
            }
            .into())
        })
    }

    fn start<'a>(&'a self, spec: &'a InstanceSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = self.runner.run(&self.run_spec(spec)).await?;
            if !out.success() {
                return Err(SwitchError::StartFailed {
                    name: spec.name.clone(),
                    detail: format!("exit code {}: {}", out.code, out.combined()),
                }
                .into());
            }
            Ok(())
        })
    }

    fn status<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<InstanceStatus>> {
        Box::pin(async move {
            let spec =
                CommandSpec::new(&self.bin).args(["inspect", "-f", "{{.State.Running}}", name]);
            let out = self.runner.run(&spec).await?;
            if out.success() && out.stdout_trimmed() == "true" {
                Ok(InstanceStatus::Running)
            } else {
                Ok(InstanceStatus::Stopped)
            }
        })
    }
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.to_lowercase().contains("no such container")
}
