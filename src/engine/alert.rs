// src/engine/alert.rs

//! Failure notification hook.

use std::sync::Arc;

use anyhow::bail;

use crate::exec::{CommandRunner, CommandSpec};
use crate::types::{BoxFuture, RunState};

/// What a failed run tells the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub service: String,
    pub state: RunState,
    pub reason: String,
    pub hint: String,
    pub exit_code: i32,
}

pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Runs the configured `alert_cmd` through the shell with the alert in
/// `ROLLOUT_*` environment variables.
pub struct CommandNotifier {
    runner: Arc<dyn CommandRunner>,
    cmd: String,
}

impl CommandNotifier {
    pub fn new(runner: Arc<dyn CommandRunner>, cmd: impl Into<String>) -> Self {
        Self {
            runner,
            cmd: cmd.into(),
        }
    }

    fn spec(&self, alert: &Alert) -> CommandSpec {
        CommandSpec::shell(&self.cmd)
            .env("ROLLOUT_SERVICE", &alert.service)
            .env("ROLLOUT_STATE", alert.state.to_string())
            .env("ROLLOUT_REASON", &alert.reason)
            .env("ROLLOUT_HINT", &alert.hint)
            .env("ROLLOUT_EXIT_CODE", alert.exit_code.to_string())
    }
}

impl Notifier for CommandNotifier {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let out = self.runner.run(&self.spec(alert)).await?;
            if !out.success() {
                bail!("alert command exited with {}: {}", out.code, out.combined());
            }
            Ok(())
        })
    }
}
