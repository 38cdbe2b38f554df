#![allow(dead_code)]

//! In-memory stand-ins for every collaborator the orchestrator talks to.
//!
//! All fakes built from one [`FakeWorld`] share a [`Journal`], so a test
//! can assert on the exact order of side effects across components.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};

use rollout::build::Builder;
use rollout::clock::Clock;
use rollout::engine::{Alert, CancelHandle, CancelSignal, Collaborators, Notifier, Orchestrator, RunPlan};
use rollout::errors::{BuildError, Result, SyncError};
use rollout::health::{HealthBody, HealthProbe, ProbeReport};
use rollout::switch::{ContainerRuntime, InstanceSpec};
use rollout::sync::Vcs;
use rollout::types::{BoxFuture, ChangeSet, InstanceStatus, Revision};

pub const PREVIOUS_REV: &str = "1111111111111111111111111111111111111111";
pub const CURRENT_REV: &str = "2222222222222222222222222222222222222222";

/// Ordered log of side effects, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, e.g. `"runtime."`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Scenario description plus the shared recorders.
///
/// Defaults describe a clean checkout on `main` that moves from
/// [`PREVIOUS_REV`] to [`CURRENT_REV`] with no changed paths, a builder
/// with an existing image, a runtime that starts fine and a service that is
/// healthy on the first probe.
#[derive(Debug, Clone)]
pub struct FakeWorld {
    pub journal: Journal,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
    pub alerts: Arc<Mutex<Vec<Alert>>>,

    repository: bool,
    dirty: bool,
    branch: Option<String>,
    previous: Revision,
    current: Revision,
    changed: Vec<String>,
    integrate_error: Option<String>,

    build_fails: Option<i32>,
    has_previous_image: bool,
    cancel_during_build: Option<CancelHandle>,

    stop_fails: bool,
    start_fails: bool,
    exits_after_start: bool,
    cancel_during_switch: Option<CancelHandle>,

    healthy_from: Option<u32>,
    notify: bool,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWorld {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            alerts: Arc::new(Mutex::new(Vec::new())),
            repository: true,
            dirty: false,
            branch: Some("main".to_string()),
            previous: Revision::new(PREVIOUS_REV),
            current: Revision::new(CURRENT_REV),
            changed: Vec::new(),
            integrate_error: None,
            build_fails: None,
            has_previous_image: true,
            cancel_during_build: None,
            stop_fails: false,
            start_fails: false,
            exits_after_start: false,
            cancel_during_switch: None,
            healthy_from: Some(1),
            notify: false,
        }
    }

    // --- source --------------------------------------------------------

    pub fn changed(mut self, paths: &[&str]) -> Self {
        self.changed = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    pub fn not_a_repository(mut self) -> Self {
        self.repository = false;
        self
    }

    pub fn detached(mut self) -> Self {
        self.branch = None;
        self
    }

    pub fn integrate_fails(mut self, reason: &str) -> Self {
        self.integrate_error = Some(reason.to_string());
        self
    }

    /// Remote has nothing new.
    pub fn up_to_date(mut self) -> Self {
        self.current = self.previous.clone();
        self.changed.clear();
        self
    }

    // --- build ---------------------------------------------------------

    pub fn build_fails(mut self, code: i32) -> Self {
        self.build_fails = Some(code);
        self
    }

    pub fn no_previous_image(mut self) -> Self {
        self.has_previous_image = false;
        self
    }

    /// Fire `handle` while the build is in progress.
    pub fn cancel_during_build(mut self, handle: CancelHandle) -> Self {
        self.cancel_during_build = Some(handle);
        self
    }

    // --- runtime -------------------------------------------------------

    pub fn stop_fails(mut self) -> Self {
        self.stop_fails = true;
        self
    }

    pub fn start_fails(mut self) -> Self {
        self.start_fails = true;
        self
    }

    pub fn exits_after_start(mut self) -> Self {
        self.exits_after_start = true;
        self
    }

    /// Fire `handle` while the new instance is being started.
    pub fn cancel_during_switch(mut self, handle: CancelHandle) -> Self {
        self.cancel_during_switch = Some(handle);
        self
    }

    // --- health --------------------------------------------------------

    /// Probe number `n` (1-based, counted across the whole run) and every
    /// later one succeed.
    pub fn healthy_from(mut self, n: u32) -> Self {
        self.healthy_from = Some(n);
        self
    }

    pub fn never_healthy(mut self) -> Self {
        self.healthy_from = None;
        self
    }

    pub fn with_notifier(mut self) -> Self {
        self.notify = true;
        self
    }

    // --- construction --------------------------------------------------

    pub fn vcs(&self) -> FakeVcs {
        FakeVcs {
            journal: self.journal.clone(),
            repository: self.repository,
            dirty: self.dirty,
            branch: self.branch.clone(),
            previous: self.previous.clone(),
            current: self.current.clone(),
            changed: self.changed.clone(),
            integrate_error: self.integrate_error.clone(),
            integrated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn builder(&self) -> FakeBuilder {
        FakeBuilder {
            journal: self.journal.clone(),
            fails_with: self.build_fails,
            has_previous: self.has_previous_image,
            cancel_on_build: self.cancel_during_build.clone(),
        }
    }

    pub fn runtime(&self) -> FakeRuntime {
        FakeRuntime {
            journal: self.journal.clone(),
            stop_fails: self.stop_fails,
            start_fails: self.start_fails,
            exits_after_start: self.exits_after_start,
            cancel_on_start: self.cancel_during_switch.clone(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn probe(&self) -> ScriptedProbe {
        ScriptedProbe {
            journal: self.journal.clone(),
            healthy_from: self.healthy_from,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn clock(&self) -> RecordingClock {
        RecordingClock {
            sleeps: self.sleeps.clone(),
        }
    }

    pub fn notifier(&self) -> RecordingNotifier {
        RecordingNotifier {
            journal: self.journal.clone(),
            alerts: self.alerts.clone(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            vcs: Box::new(self.vcs()),
            builder: Box::new(self.builder()),
            runtime: Box::new(self.runtime()),
            probe: Box::new(self.probe()),
            clock: Box::new(self.clock()),
            notifier: self
                .notify
                .then(|| Box::new(self.notifier()) as Box<dyn Notifier>),
        }
    }

    pub fn orchestrator(&self, plan: RunPlan) -> Orchestrator {
        Orchestrator::new(plan, self.collaborators(), CancelSignal::never())
    }

    pub fn orchestrator_with_cancel(&self, plan: RunPlan, cancel: CancelSignal) -> Orchestrator {
        Orchestrator::new(plan, self.collaborators(), cancel)
    }

    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn recorded_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

// ----------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeVcs {
    journal: Journal,
    repository: bool,
    dirty: bool,
    branch: Option<String>,
    previous: Revision,
    current: Revision,
    changed: Vec<String>,
    integrate_error: Option<String>,
    integrated: Arc<AtomicBool>,
}

impl Vcs for FakeVcs {
    fn is_repository(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.repository) })
    }

    fn head(&self) -> BoxFuture<'_, Result<Revision>> {
        Box::pin(async move {
            if self.integrated.load(Ordering::SeqCst) {
                Ok(self.current.clone())
            } else {
                Ok(self.previous.clone())
            }
        })
    }

    fn has_local_changes(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.dirty) })
    }

    fn stash<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("vcs.stash:{label}"));
            Ok(())
        })
    }

    fn current_branch(&self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { Ok(self.branch.clone()) })
    }

    fn integrate<'a>(&'a self, remote: &'a str, branch: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("vcs.integrate:{remote}/{branch}"));
            if let Some(reason) = &self.integrate_error {
                return Err(SyncError::ConnectivityOrConflict(reason.clone()).into());
            }
            self.integrated.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn changed_paths<'a>(
        &'a self,
        previous: &'a Revision,
        current: &'a Revision,
    ) -> BoxFuture<'a, Result<ChangeSet>> {
        Box::pin(async move {
            self.journal
                .record(format!("vcs.diff:{}..{}", previous.short(), current.short()));
            Ok(ChangeSet::new(self.changed.iter().cloned()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeBuilder {
    journal: Journal,
    fails_with: Option<i32>,
    has_previous: bool,
    cancel_on_build: Option<CancelHandle>,
}

impl Builder for FakeBuilder {
    fn build<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("build:{artifact}"));
            if let Some(handle) = &self.cancel_on_build {
                handle.cancel();
            }
            match self.fails_with {
                Some(code) => Err(BuildError::ToolchainFailure {
                    artifact: artifact.to_string(),
                    code,
                    log: "step 3/7: RUN pip install -r requirements.txt\nerror: no matching distribution"
                        .to_string(),
                }
                .into()),
                None => Ok(()),
            }
        })
    }

    fn preserve<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.journal.record(format!("preserve:{artifact}"));
            Ok(self.has_previous)
        })
    }

    fn restore<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("restore:{artifact}"));
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeRuntime {
    journal: Journal,
    stop_fails: bool,
    start_fails: bool,
    exits_after_start: bool,
    cancel_on_start: Option<CancelHandle>,
    running: Arc<AtomicBool>,
}

impl ContainerRuntime for FakeRuntime {
    fn stop<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("runtime.stop:{name}"));
            if self.stop_fails {
                return Err(anyhow!("permission denied while trying to connect to the daemon").into());
            }
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn start<'a>(&'a self, spec: &'a InstanceSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.journal.record(format!("runtime.start:{}", spec.artifact));
            if let Some(handle) = &self.cancel_on_start {
                handle.cancel();
            }
            if self.start_fails {
                return Err(anyhow!("port {} is already allocated", spec.host_port).into());
            }
            self.running.store(!self.exits_after_start, Ordering::SeqCst);
            Ok(())
        })
    }

    fn status<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<InstanceStatus>> {
        Box::pin(async move {
            self.journal.record(format!("runtime.status:{name}"));
            if self.running.load(Ordering::SeqCst) {
                Ok(InstanceStatus::Running)
            } else {
                Ok(InstanceStatus::Stopped)
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    journal: Journal,
    healthy_from: Option<u32>,
    calls: Arc<AtomicU32>,
}

impl ScriptedProbe {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HealthProbe for ScriptedProbe {
    fn probe<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, anyhow::Result<ProbeReport>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.journal.record("probe");
            match self.healthy_from {
                Some(first) if n >= first => Ok(ProbeReport {
                    status_code: 200,
                    body: Some(HealthBody {
                        status: Some("healthy".to_string()),
                        ..HealthBody::default()
                    }),
                }),
                _ => Err(anyhow!("GET {endpoint}: connection refused")),
            }
        })
    }
}

/// Clock whose `sleep` returns immediately and is only recorded.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    /// 2026-01-02T03:04:05Z, so stash labels are predictable.
    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        Self::fixed_now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.sleeps.lock().unwrap().push(duration);
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    journal: Journal,
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.journal.record("alert");
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        })
    }
}
