// src/engine/mod.rs

//! Orchestration engine for rollout.
//!
//! This module ties together:
//! - the run plan derived from configuration
//! - the collaborators (VCS, builder, container runtime, health probe,
//!   clock, notifier) behind narrow traits
//! - the cancellation signal, honoured only between states
//!
//! The pure state machine lives in `core`; the async/IO shell that
//! executes each state is [`runtime::Orchestrator`].

pub mod alert;
pub mod core;
pub mod runtime;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::build::{Builder, DockerBuilder};
use crate::classify::WatchedPaths;
use crate::clock::{Clock, TokioClock};
use crate::config::ConfigFile;
use crate::errors::{Result, RolloutError};
use crate::exec::CommandRunner;
use crate::health::{HealthPolicy, HealthProbe, HttpProbe};
use crate::switch::{ContainerRuntime, DockerRuntime, InstanceSpec};
use crate::sync::{GitVcs, SourceSync, Vcs};
use crate::types::HealthFailureStrategy;

pub use alert::{Alert, CommandNotifier, Notifier};
pub use self::core::{RunMachine, StepOutcome};
pub use runtime::Orchestrator;

/// Everything one run needs to know, resolved from configuration.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub service: String,
    pub source: SourceSync,
    pub watched: WatchedPaths,
    pub artifact: String,
    pub instance: InstanceSpec,
    pub health: HealthPolicy,
    pub on_health_failure: HealthFailureStrategy,
    pub lock_dir: PathBuf,
}

impl RunPlan {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let watched = WatchedPaths::new(cfg.build.watch.iter().cloned())
            .map_err(|e| RolloutError::ConfigError(format!("[build].watch: {e:#}")))?;

        Ok(Self {
            service: cfg.service.name.clone(),
            source: SourceSync::new(&cfg.source.root, &cfg.source.remote),
            watched,
            artifact: cfg.build.artifact.clone(),
            instance: InstanceSpec {
                name: cfg.service.name.clone(),
                artifact: cfg.build.artifact.clone(),
                host_port: cfg.service.port,
                container_port: cfg.service.container_port,
                env_file: cfg.service.env_file.clone(),
            },
            health: HealthPolicy {
                endpoint: cfg.health.endpoint.clone(),
                max_attempts: cfg.health.max_attempts,
                interval: Duration::from_secs(cfg.health.interval_seconds),
                initial_delay: Duration::from_secs(cfg.health.initial_delay_seconds),
            },
            on_health_failure: cfg.rollout.on_health_failure,
            lock_dir: cfg.rollout.lock_dir.clone(),
        })
    }
}

/// The external world, one trait object per concern.
pub struct Collaborators {
    pub vcs: Box<dyn Vcs>,
    pub builder: Box<dyn Builder>,
    pub runtime: Box<dyn ContainerRuntime>,
    pub probe: Box<dyn HealthProbe>,
    pub clock: Box<dyn Clock>,
    pub notifier: Option<Box<dyn Notifier>>,
}

impl Collaborators {
    /// Real adapters: `git`, the configured container CLI, HTTP probes and
    /// the tokio clock.
    pub fn production(cfg: &ConfigFile, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let probe = HttpProbe::new(Duration::from_secs(cfg.health.probe_timeout_seconds))?;
        let notifier = cfg.rollout.alert_cmd.as_ref().map(|cmd| {
            Box::new(CommandNotifier::new(runner.clone(), cmd.clone())) as Box<dyn Notifier>
        });

        Ok(Self {
            vcs: Box::new(GitVcs::new(runner.clone(), &cfg.source.root)),
            builder: Box::new(DockerBuilder::new(
                runner.clone(),
                &cfg.runtime.bin,
                &cfg.build.context,
                cfg.build.dockerfile.clone(),
            )),
            runtime: Box::new(DockerRuntime::new(runner, &cfg.runtime.bin)),
            probe: Box::new(probe),
            clock: Box::new(TokioClock),
            notifier,
        })
    }
}

/// Sender half of a cancellation request.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver half, checked by the orchestrator between states only.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(Arc::new(tx)), CancelSignal(rx))
    }

    /// A signal that never fires.
    pub fn never() -> CancelSignal {
        CancelSignal::channel().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}
