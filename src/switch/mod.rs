// src/switch/mod.rs

//! Service switching: stop the running instance, start the new one.
//!
//! This is stop-then-start; the port is unserved between the two steps.

pub mod docker;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::errors::{Result, RolloutError, SwitchError};
use crate::types::{BoxFuture, InstanceStatus};

pub use docker::DockerRuntime;

/// How to run one instance of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub name: String,
    pub artifact: String,
    pub host_port: u16,
    pub container_port: u16,
    pub env_file: Option<PathBuf>,
}

/// Narrow contract over the container/process runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Stop and remove the named instance. Succeeds when none exists.
    fn stop<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn start<'a>(&'a self, spec: &'a InstanceSpec) -> BoxFuture<'a, Result<()>>;

    fn status<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<InstanceStatus>>;
}

/// Replace the running instance with one started from `spec.artifact`.
///
/// Every failure is reported as a [`SwitchError`]; a start that returns
/// successfully but leaves the instance not running counts as
/// [`SwitchError::StartFailed`].
pub async fn switch_service(runtime: &dyn ContainerRuntime, spec: &InstanceSpec) -> Result<()> {
    info!(instance = %spec.name, "stopping current instance");
    runtime
        .stop(&spec.name)
        .await
        .map_err(|e| into_switch_error(e, |detail| SwitchError::StopFailed {
            name: spec.name.clone(),
            detail,
        }))?;

    info!(
        instance = %spec.name,
        artifact = %spec.artifact,
        port = spec.host_port,
        "starting new instance"
    );
    runtime
        .start(spec)
        .await
        .map_err(|e| into_switch_error(e, |detail| SwitchError::StartFailed {
            name: spec.name.clone(),
            detail,
        }))?;

    let status = runtime.status(&spec.name).await.map_err(|e| {
        into_switch_error(e, |detail| SwitchError::StartFailed {
            name: spec.name.clone(),
            detail,
        })
    })?;
    if status != InstanceStatus::Running {
        warn!(instance = %spec.name, "instance exited right after start");
        return Err(SwitchError::StartFailed {
            name: spec.name.clone(),
            detail: "instance is not running after start".to_string(),
        }
        .into());
    }

    info!(instance = %spec.name, "instance running");
    Ok(())
}

fn into_switch_error(err: RolloutError, wrap: impl FnOnce(String) -> SwitchError) -> RolloutError {
    match err {
        RolloutError::Switch(e) => RolloutError::Switch(e),
        other => wrap(other.to_string()).into(),
    }
}
