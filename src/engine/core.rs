// src/engine/core.rs

//! Pure run state machine.
//!
//! [`RunMachine`] consumes [`StepOutcome`]s and moves through
//! `Idle -> Syncing -> Classifying -> (Building)? -> Switching -> Verifying
//! -> Done`. It performs no IO; the async shell in `engine::runtime` does the
//! work for each state and feeds the outcome back in.
//!
//! Transitions are strictly linear. Any failure, and any outcome that does
//! not belong to the current state, goes straight to `Done` with a failure
//! that names the state it happened in.

use anyhow::anyhow;
use tracing::{error, info};

use crate::errors::{HealthError, RolloutError};
use crate::health::HealthVerdict;
use crate::types::{
    HealthStatus, RebuildDecision, Revision, RollbackOutcome, RunFailure, RunReport, RunResult,
    RunState,
};

/// What the shell observed while executing the current state.
#[derive(Debug)]
pub enum StepOutcome {
    Synced { previous: Revision, current: Revision },
    Classified(RebuildDecision),
    Built,
    Switched,
    Verified(HealthVerdict),
    Failed(RolloutError),
    /// Cancellation observed at the boundary before the current state.
    Cancelled,
}

#[derive(Debug)]
pub struct RunMachine {
    service: String,
    state: RunState,
    visited: Vec<RunState>,
    previous: Option<Revision>,
    current: Option<Revision>,
    decision: Option<RebuildDecision>,
    health: HealthStatus,
    result: Option<RunResult>,
}

impl RunMachine {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            state: RunState::Idle,
            visited: vec![RunState::Idle],
            previous: None,
            current: None,
            decision: None,
            health: HealthStatus::Unknown,
            result: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The state the shell should execute next, or `None` once the run
    /// cannot make progress (not started, or done).
    pub fn active_state(&self) -> Option<RunState> {
        match self.state {
            RunState::Idle | RunState::Done => None,
            s => Some(s),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn revisions(&self) -> Option<(&Revision, &Revision)> {
        self.previous.as_ref().zip(self.current.as_ref())
    }

    pub fn decision(&self) -> Option<RebuildDecision> {
        self.decision
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.result.as_ref().and_then(RunResult::failure)
    }

    /// `Idle -> Syncing`.
    pub fn start(&mut self) -> RunState {
        if self.state == RunState::Idle {
            self.enter(RunState::Syncing);
        }
        self.state
    }

    /// Finish the run without starting it (e.g. the run lock is held).
    pub fn reject(&mut self, error: RolloutError) {
        if self.state == RunState::Idle {
            self.fail(error);
        }
    }

    /// Apply the outcome of the current state and return the next state.
    pub fn advance(&mut self, outcome: StepOutcome) -> RunState {
        if self.active_state().is_none() {
            return self.state;
        }

        match (self.state, outcome) {
            (_, StepOutcome::Failed(err)) => self.fail(err),
            (state, StepOutcome::Cancelled) => self.fail(RolloutError::Cancelled(state)),

            (RunState::Syncing, StepOutcome::Synced { previous, current }) => {
                self.previous = Some(previous);
                self.current = Some(current);
                self.enter(RunState::Classifying);
            }

            (RunState::Classifying, StepOutcome::Classified(decision)) => {
                self.decision = Some(decision);
                if decision.requires_build() {
                    self.enter(RunState::Building);
                } else {
                    // Restart is never skipped, even for NoAction.
                    self.enter(RunState::Switching);
                }
            }

            (RunState::Building, StepOutcome::Built) => self.enter(RunState::Switching),

            (RunState::Switching, StepOutcome::Switched) => self.enter(RunState::Verifying),

            (RunState::Verifying, StepOutcome::Verified(verdict)) => {
                self.health = verdict.status;
                match verdict.status {
                    HealthStatus::Healthy => self.succeed(),
                    HealthStatus::Unhealthy | HealthStatus::Unknown => {
                        self.fail(
                            HealthError::Unhealthy {
                                endpoint: verdict.endpoint,
                                attempts: verdict.probes,
                            }
                            .into(),
                        );
                    }
                }
            }

            (state, unexpected) => {
                self.fail(anyhow!("unexpected outcome {unexpected:?} while {state}").into());
            }
        }

        self.state
    }

    /// Consume the machine into the report returned to the caller.
    ///
    /// A machine that never reached `Done` is itself a failure.
    pub fn into_report(mut self, rollback: RollbackOutcome) -> RunReport {
        if !self.is_done() {
            let state = self.state;
            self.fail(anyhow!("run stopped in {state} without a verdict").into());
        }

        RunReport {
            service: self.service,
            previous: self.previous,
            current: self.current,
            decision: self.decision,
            visited: self.visited,
            health: self.health,
            rollback,
            result: self.result.unwrap_or(RunResult::Success),
        }
    }

    fn enter(&mut self, next: RunState) {
        info!(service = %self.service, from = %self.state, to = %next, "state transition");
        self.state = next;
        self.visited.push(next);
    }

    fn succeed(&mut self) {
        self.result = Some(RunResult::Success);
        self.enter(RunState::Done);
    }

    fn fail(&mut self, error: RolloutError) {
        let state = self.state;
        error!(service = %self.service, state = %state, error = %error, "run failed");
        self.result = Some(RunResult::Failure(RunFailure { state, error }));
        self.enter(RunState::Done);
    }
}
