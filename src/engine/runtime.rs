// src/engine/runtime.rs

use std::fmt;

use tracing::{error, info, warn};

use crate::build::execute_build;
use crate::classify::{classify, watched_hits};
use crate::errors::RolloutError;
use crate::health::verify;
use crate::lock::RunLock;
use crate::switch::switch_service;
use crate::types::{
    HealthFailureStrategy, HealthStatus, RollbackOutcome, RunReport, RunState,
};

use super::alert::Alert;
use super::core::{RunMachine, StepOutcome};
use super::{CancelSignal, Collaborators, RunPlan};

/// Drives one run: takes the service lock, executes each state the
/// [`RunMachine`] asks for and feeds the outcome back until it is done.
///
/// This is the IO shell around `RunMachine`; every decision about what
/// comes next lives in the machine.
pub struct Orchestrator {
    plan: RunPlan,
    parts: Collaborators,
    cancel: CancelSignal,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(plan: RunPlan, parts: Collaborators, cancel: CancelSignal) -> Self {
        Self {
            plan,
            parts,
            cancel,
        }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Run to a terminal state. Never panics on collaborator failures; every
    /// failure ends up in the returned report.
    pub async fn run(&self) -> RunReport {
        let mut machine = RunMachine::new(&self.plan.service);

        let _lock = match RunLock::acquire(&self.plan.lock_dir, &self.plan.service) {
            Ok(lock) => lock,
            Err(err) => {
                machine.reject(err);
                return self.finish(machine, RollbackOutcome::NotAttempted).await;
            }
        };

        info!(service = %self.plan.service, artifact = %self.plan.artifact, "run started");
        machine.start();

        // Set when this run preserved the previous artifact before rebuilding.
        let mut preserved = false;

        while let Some(state) = machine.active_state() {
            if self.cancel.is_cancelled() {
                warn!(service = %self.plan.service, state = %state, "cancellation requested");
                machine.advance(StepOutcome::Cancelled);
                continue;
            }

            let outcome = match state {
                RunState::Syncing => self.sync_step().await,
                RunState::Classifying => self.classify_step(&machine).await,
                RunState::Building => self.build_step(&mut preserved).await,
                RunState::Switching => self.switch_step().await,
                RunState::Verifying => self.verify_step().await,
                RunState::Idle | RunState::Done => break,
            };
            machine.advance(outcome);
        }

        let rollback = self.handle_health_failure(&machine, preserved).await;
        self.finish(machine, rollback).await
    }

    async fn sync_step(&self) -> StepOutcome {
        let parts = &self.parts;
        match self.plan.source.sync(parts.vcs.as_ref(), parts.clock.as_ref()).await {
            Ok(outcome) => StepOutcome::Synced {
                previous: outcome.previous,
                current: outcome.current,
            },
            Err(err) => StepOutcome::Failed(err),
        }
    }

    async fn classify_step(&self, machine: &RunMachine) -> StepOutcome {
        let Some((previous, current)) = machine.revisions() else {
            return StepOutcome::Failed(
                anyhow::anyhow!("classification requested before revisions were captured").into(),
            );
        };

        let changes = match self.parts.vcs.changed_paths(previous, current).await {
            Ok(changes) => changes,
            Err(err) => return StepOutcome::Failed(err),
        };

        let decision = classify(&changes, &self.plan.watched);
        info!(
            changed = changes.len(),
            watched_hits = ?watched_hits(&changes, &self.plan.watched),
            decision = %decision,
            "change set classified"
        );
        StepOutcome::Classified(decision)
    }

    async fn build_step(&self, preserved: &mut bool) -> StepOutcome {
        let builder = self.parts.builder.as_ref();

        if self.plan.on_health_failure == HealthFailureStrategy::AutoRollback {
            match builder.preserve(&self.plan.artifact).await {
                Ok(kept) => *preserved = kept,
                Err(err) => warn!(
                    artifact = %self.plan.artifact,
                    error = %err,
                    "could not preserve previous artifact; rollback will be unavailable"
                ),
            }
        }

        match execute_build(builder, &self.plan.artifact).await {
            Ok(()) => StepOutcome::Built,
            Err(err) => StepOutcome::Failed(err),
        }
    }

    async fn switch_step(&self) -> StepOutcome {
        match switch_service(self.parts.runtime.as_ref(), &self.plan.instance).await {
            Ok(()) => StepOutcome::Switched,
            Err(err) => StepOutcome::Failed(err),
        }
    }

    async fn verify_step(&self) -> StepOutcome {
        let verdict = verify(
            self.parts.probe.as_ref(),
            self.parts.clock.as_ref(),
            &self.plan.health,
        )
        .await;
        StepOutcome::Verified(verdict)
    }

    /// Apply the configured strategy after a failed verification.
    ///
    /// Rollback never changes the verdict: the run still failed.
    async fn handle_health_failure(&self, machine: &RunMachine, preserved: bool) -> RollbackOutcome {
        let unhealthy = matches!(
            machine.failure(),
            Some(f) if matches!(f.error, RolloutError::Health(_))
        );
        if !unhealthy {
            return RollbackOutcome::NotAttempted;
        }

        match self.plan.on_health_failure {
            HealthFailureStrategy::AlertOnly => {
                warn!(
                    service = %self.plan.service,
                    "leaving unhealthy instance running (on_health_failure = alert_only)"
                );
                RollbackOutcome::NotAttempted
            }
            HealthFailureStrategy::AutoRollback if !preserved => {
                warn!(
                    service = %self.plan.service,
                    "no previous artifact was preserved during this run; cannot roll back"
                );
                RollbackOutcome::Unavailable
            }
            HealthFailureStrategy::AutoRollback => self.roll_back().await,
        }
    }

    async fn roll_back(&self) -> RollbackOutcome {
        let artifact = &self.plan.artifact;
        warn!(service = %self.plan.service, artifact = %artifact, "rolling back to previous artifact");

        if let Err(err) = self.parts.builder.restore(artifact).await {
            error!(error = %err, "restoring previous artifact failed");
            return RollbackOutcome::Failed(err.to_string());
        }
        if let Err(err) = switch_service(self.parts.runtime.as_ref(), &self.plan.instance).await {
            error!(error = %err, "switching back to previous artifact failed");
            return RollbackOutcome::Failed(err.to_string());
        }

        let verdict = verify(
            self.parts.probe.as_ref(),
            self.parts.clock.as_ref(),
            &self.plan.health,
        )
        .await;
        match verdict.status {
            HealthStatus::Healthy => info!(service = %self.plan.service, "rolled back instance is healthy"),
            _ => error!(service = %self.plan.service, "rolled back instance is not healthy either"),
        }
        RollbackOutcome::Restored(verdict.status)
    }

    async fn finish(&self, machine: RunMachine, rollback: RollbackOutcome) -> RunReport {
        let report = machine.into_report(rollback);

        match report.result.failure() {
            None => info!(
                service = %report.service,
                revision = %report.current.as_ref().map(|r| r.short()).unwrap_or("-"),
                "run succeeded"
            ),
            Some(failure) => {
                error!(
                    service = %report.service,
                    state = %failure.state,
                    hint = failure.error.hint(),
                    "{}",
                    failure.error
                );
                if let Some(notifier) = &self.parts.notifier {
                    let alert = Alert {
                        service: report.service.clone(),
                        state: failure.state,
                        reason: failure.error.to_string(),
                        hint: failure.error.hint().to_string(),
                        exit_code: failure.error.exit_code(),
                    };
                    if let Err(err) = notifier.notify(&alert).await {
                        error!(error = %err, "alert hook failed");
                    }
                }
            }
        }

        report
    }
}
