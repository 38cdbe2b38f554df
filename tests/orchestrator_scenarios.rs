// tests/orchestrator_scenarios.rs
mod common;
use crate::common::builders::{ConfigFileBuilder, secs};
use crate::common::fakes::FakeWorld;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::path::Path;

use tempfile::TempDir;

use rollout::engine::{CancelSignal, RunPlan};
use rollout::errors::{RolloutError, SwitchError};
use rollout::lock::RunLock;
use rollout::types::{
    HealthFailureStrategy, HealthStatus, RebuildDecision, RollbackOutcome, RunState,
};

fn plan(lock_dir: &Path) -> RunPlan {
    ConfigFileBuilder::new().with_lock_dir(lock_dir).plan()
}

fn rollback_plan(lock_dir: &Path) -> RunPlan {
    ConfigFileBuilder::new()
        .with_lock_dir(lock_dir)
        .with_strategy(HealthFailureStrategy::AutoRollback)
        .plan()
}

#[tokio::test]
async fn docs_only_change_restarts_without_building() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().changed(&["README.md"]);

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert!(report.result.is_success(), "{:?}", report.result);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.decision, Some(RebuildDecision::RestartOnly));
        assert_eq!(report.health, HealthStatus::Healthy);
        assert_eq!(
            report.visited,
            vec![
                RunState::Idle,
                RunState::Syncing,
                RunState::Classifying,
                RunState::Switching,
                RunState::Verifying,
                RunState::Done,
            ]
        );
        assert_eq!(
            world.journal.entries(),
            vec![
                "vcs.integrate:origin/main",
                "vcs.diff:111111111111..222222222222",
                "runtime.stop:api",
                "runtime.start:api:latest",
                "runtime.status:api",
                "probe",
            ]
        );
        assert_eq!(world.recorded_sleeps(), vec![secs(10)]);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn manifest_change_rebuilds_then_fails_verification() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new()
            .changed(&["requirements.txt", "app.py"])
            .never_healthy();

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert_eq!(report.decision, Some(RebuildDecision::RebuildAndRestart));
        assert!(report.visited(RunState::Building));
        assert_eq!(report.health, HealthStatus::Unhealthy);
        assert_eq!(report.exit_code(), 40);
        assert_eq!(report.rollback, RollbackOutcome::NotAttempted);

        let failure = report.result.failure().expect("run should fail");
        assert_eq!(failure.state, RunState::Verifying);
        assert!(matches!(failure.error, RolloutError::Health(_)));

        // Build happens before the old instance is stopped.
        let build = world.journal.position("build:api:latest").unwrap();
        let stop = world.journal.position("runtime.stop:api").unwrap();
        assert!(build < stop);

        assert_eq!(world.journal.count("probe"), 5);
        assert_eq!(world.journal.count("restore:"), 0);
        // Warm-up, then one interval between each pair of probes.
        assert_eq!(
            world.recorded_sleeps(),
            vec![secs(10), secs(5), secs(5), secs(5), secs(5)]
        );

        Ok(())
    })
    .await
}

#[tokio::test]
async fn healthy_on_a_later_probe_still_succeeds() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().changed(&["app.py"]).healthy_from(3);

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert!(report.result.is_success());
        assert_eq!(world.journal.count("probe"), 3);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn build_failure_leaves_running_instance_alone() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().changed(&["Dockerfile"]).build_fails(2);

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert_eq!(failure.state, RunState::Building);
        assert_eq!(report.exit_code(), 20);
        assert!(!report.visited(RunState::Switching));
        assert_eq!(world.journal.count("runtime."), 0);
        assert_eq!(world.journal.count("probe"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_start_skips_verification() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().start_fails();

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert_eq!(failure.state, RunState::Switching);
        assert!(matches!(
            failure.error,
            RolloutError::Switch(SwitchError::StartFailed { .. })
        ));
        assert_eq!(report.exit_code(), 30);
        assert!(!report.visited(RunState::Verifying));
        assert_eq!(world.journal.count("probe"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn instance_that_exits_right_away_is_a_start_failure() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().exits_after_start();

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(
            failure.error,
            RolloutError::Switch(SwitchError::StartFailed { .. })
        ));
        assert_eq!(world.journal.count("probe"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_stop_never_starts_a_second_instance() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().stop_fails();

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(
            failure.error,
            RolloutError::Switch(SwitchError::StopFailed { .. })
        ));
        assert_eq!(world.journal.count("runtime.start:"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn nothing_new_upstream_still_restarts_and_verifies() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().up_to_date();

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert!(report.result.is_success());
        assert_eq!(report.previous, report.current);
        assert_eq!(report.decision, Some(RebuildDecision::NoAction));
        assert!(report.visited(RunState::Switching));
        assert!(report.visited(RunState::Verifying));
        assert!(!report.visited(RunState::Building));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn sync_failure_stops_before_touching_the_runtime() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().integrate_fails("Not possible to fast-forward, aborting.");

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert_eq!(failure.state, RunState::Syncing);
        assert_eq!(report.exit_code(), 10);
        assert_eq!(world.journal.count("runtime."), 0);
        assert_eq!(world.journal.count("build:"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn local_edits_are_stashed_before_integrating() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().dirty();

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert!(report.result.is_success());
        let stash = world
            .journal
            .position("vcs.stash:rollout-autostash-20260102T030405Z")
            .expect("stash recorded");
        let integrate = world.journal.position("vcs.integrate:origin/main").unwrap();
        assert!(stash < integrate);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn auto_rollback_restores_the_preserved_image() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        // Five failed probes for the new image, then the old one answers.
        let world = FakeWorld::new().changed(&["Dockerfile"]).healthy_from(6);

        let report = world.orchestrator(rollback_plan(locks.path())).run().await;

        assert_eq!(report.rollback, RollbackOutcome::Restored(HealthStatus::Healthy));
        // The run itself still failed.
        assert_eq!(report.exit_code(), 40);

        let preserve = world.journal.position("preserve:api:latest").unwrap();
        let build = world.journal.position("build:api:latest").unwrap();
        let restore = world.journal.position("restore:api:latest").unwrap();
        assert!(preserve < build);
        assert!(build < restore);
        assert_eq!(world.journal.count("runtime.start:"), 2);
        assert_eq!(world.journal.count("probe"), 6);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn auto_rollback_without_previous_image_is_unavailable() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new()
            .changed(&["Dockerfile"])
            .no_previous_image()
            .never_healthy();

        let report = world.orchestrator(rollback_plan(locks.path())).run().await;

        assert_eq!(report.rollback, RollbackOutcome::Unavailable);
        assert_eq!(world.journal.count("restore:"), 0);
        assert_eq!(world.journal.count("runtime.start:"), 1);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn restart_only_run_has_nothing_to_roll_back_to() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().changed(&["README.md"]).never_healthy();

        let report = world.orchestrator(rollback_plan(locks.path())).run().await;

        assert_eq!(report.rollback, RollbackOutcome::Unavailable);
        assert_eq!(world.journal.count("preserve:"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn held_lock_rejects_the_run() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let _other_run = RunLock::acquire(locks.path(), "api")?;
        let world = FakeWorld::new();

        let report = world.orchestrator(plan(locks.path())).run().await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(failure.error, RolloutError::ConcurrentRun { .. }));
        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.visited, vec![RunState::Idle, RunState::Done]);
        assert!(world.journal.entries().is_empty());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancellation_is_honoured_at_the_next_boundary() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new();
        let (handle, signal) = CancelSignal::channel();
        handle.cancel();

        let report = world
            .orchestrator_with_cancel(plan(locks.path()), signal)
            .run()
            .await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(
            failure.error,
            RolloutError::Cancelled(RunState::Syncing)
        ));
        assert_eq!(report.exit_code(), 50);
        assert!(world.journal.entries().is_empty());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancel_raised_mid_build_lets_the_build_finish() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let (handle, signal) = CancelSignal::channel();
        let world = FakeWorld::new()
            .changed(&["requirements.txt"])
            .cancel_during_build(handle);

        let report = world
            .orchestrator_with_cancel(plan(locks.path()), signal)
            .run()
            .await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(
            failure.error,
            RolloutError::Cancelled(RunState::Switching)
        ));
        assert_eq!(report.exit_code(), 50);
        assert_eq!(failure.state, RunState::Switching);
        assert!(report.visited.ends_with(&[
            RunState::Building,
            RunState::Switching,
            RunState::Done,
        ]));
        assert_eq!(world.journal.count("build:api:latest"), 1);
        assert!(world.journal.matching("runtime.").is_empty());
        assert_eq!(world.journal.count("probe"), 0);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancel_raised_mid_switch_skips_verification() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let (handle, signal) = CancelSignal::channel();
        let world = FakeWorld::new()
            .changed(&["README.md"])
            .cancel_during_switch(handle);

        let report = world
            .orchestrator_with_cancel(plan(locks.path()), signal)
            .run()
            .await;

        let failure = report.result.failure().expect("run should fail");
        assert!(matches!(
            failure.error,
            RolloutError::Cancelled(RunState::Verifying)
        ));
        assert_eq!(report.exit_code(), 50);
        assert_eq!(failure.state, RunState::Verifying);
        assert!(report.visited.ends_with(&[
            RunState::Switching,
            RunState::Verifying,
            RunState::Done,
        ]));
        assert_eq!(
            world.journal.matching("runtime."),
            vec![
                "runtime.stop:api",
                "runtime.start:api:latest",
                "runtime.status:api",
            ]
        );
        assert_eq!(world.journal.count("probe"), 0);
        assert!(world.recorded_sleeps().is_empty());

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failures_are_reported_to_the_notifier() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new()
            .changed(&["requirements.txt"])
            .build_fails(1)
            .with_notifier();

        world.orchestrator(plan(locks.path())).run().await;

        let alerts = world.recorded_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].service, "api");
        assert_eq!(alerts[0].state, RunState::Building);
        assert_eq!(alerts[0].exit_code, 20);
        assert!(alerts[0].hint.contains("build log"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn successful_runs_do_not_alert() -> TestResult {
    with_timeout(async {
        init_tracing();
        let locks = TempDir::new()?;
        let world = FakeWorld::new().with_notifier();

        let report = world.orchestrator(plan(locks.path())).run().await;

        assert!(report.result.is_success());
        assert!(world.recorded_alerts().is_empty());

        Ok(())
    })
    .await
}
