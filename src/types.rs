use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::RolloutError;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque identifier of a version-control state (a commit hash for git).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paths that differ between two revisions, relative to the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

/// What a run has to do to converge on the new revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildDecision {
    NoAction,
    RestartOnly,
    RebuildAndRestart,
}

impl RebuildDecision {
    pub fn requires_build(self) -> bool {
        matches!(self, RebuildDecision::RebuildAndRestart)
    }
}

impl fmt::Display for RebuildDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebuildDecision::NoAction => "no-action",
            RebuildDecision::RestartOnly => "restart-only",
            RebuildDecision::RebuildAndRestart => "rebuild-and-restart",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// Runtime view of a named service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
}

/// States of one orchestration run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Syncing,
    Classifying,
    Building,
    Switching,
    Verifying,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Syncing => "syncing",
            RunState::Classifying => "classifying",
            RunState::Building => "building",
            RunState::Switching => "switching",
            RunState::Verifying => "verifying",
            RunState::Done => "done",
        };
        f.write_str(s)
    }
}

/// What to do when the new instance never becomes healthy.
///
/// - `AlertOnly`: leave the new instance running and report the failure
///   (default).
/// - `AutoRollback`: restore the artifact preserved before this run's
///   rebuild, switch back to it and verify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthFailureStrategy {
    AlertOnly,
    AutoRollback,
}

impl Default for HealthFailureStrategy {
    fn default() -> Self {
        HealthFailureStrategy::AlertOnly
    }
}

impl FromStr for HealthFailureStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "alert_only" => Ok(HealthFailureStrategy::AlertOnly),
            "auto_rollback" => Ok(HealthFailureStrategy::AutoRollback),
            other => Err(format!(
                "invalid on_health_failure: {other} (expected \"alert_only\" or \"auto_rollback\")"
            )),
        }
    }
}

/// Outcome of the rollback attempted after a failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Strategy is `AlertOnly`, or the run failed before verification.
    NotAttempted,
    /// `AutoRollback` was requested but no previous artifact was preserved
    /// during this run.
    Unavailable,
    /// The previous artifact was restored and switched back in.
    Restored(HealthStatus),
    Failed(String),
}

/// Terminal failure of a run: the state it failed in and why.
#[derive(Debug)]
pub struct RunFailure {
    pub state: RunState,
    pub error: RolloutError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (hint: {})", self.state, self.error, self.error.hint())
    }
}

#[derive(Debug)]
pub enum RunResult {
    Success,
    Failure(RunFailure),
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success)
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunResult::Success => None,
            RunResult::Failure(f) => Some(f),
        }
    }
}

/// Everything a finished run reports back to its caller.
#[derive(Debug)]
pub struct RunReport {
    pub service: String,
    pub previous: Option<Revision>,
    pub current: Option<Revision>,
    pub decision: Option<RebuildDecision>,
    /// Every state entered, in order, including `Idle` and `Done`.
    pub visited: Vec<RunState>,
    pub health: HealthStatus,
    pub rollback: RollbackOutcome,
    pub result: RunResult,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            RunResult::Success => 0,
            RunResult::Failure(f) => f.error.exit_code(),
        }
    }

    pub fn visited(&self, state: RunState) -> bool {
        self.visited.contains(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_cli_and_toml_spellings() {
        assert_eq!(
            "auto-rollback".parse::<HealthFailureStrategy>(),
            Ok(HealthFailureStrategy::AutoRollback)
        );
        assert_eq!(
            " Alert_Only ".parse::<HealthFailureStrategy>(),
            Ok(HealthFailureStrategy::AlertOnly)
        );
        assert!("rollback".parse::<HealthFailureStrategy>().is_err());
    }

    #[test]
    fn short_revision_truncates_long_hashes_only() {
        let long = Revision::new("0123456789abcdef0123");
        assert_eq!(long.short(), "0123456789ab");
        assert_eq!(Revision::new("abc").short(), "abc");
    }
}
