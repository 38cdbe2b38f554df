// src/lib.rs

pub mod build;
pub mod classify;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod health;
pub mod lock;
pub mod logging;
pub mod switch;
pub mod sync;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate, validate_environment};
use crate::engine::{CancelSignal, Collaborators, Orchestrator, RunPlan};
use crate::errors::Result;
use crate::exec::ProcessRunner;
use crate::types::{RunReport, RunResult};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and validation
/// - the production adapters (git, container CLI, HTTP probe)
/// - Ctrl-C handling (honoured between states)
/// - the orchestrator itself
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?.rooted_at(&config_root_dir(&config_path));

    if let Some(strategy) = args.on_health_failure {
        cfg.rollout.on_health_failure = strategy;
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    validate_environment(&cfg)?;

    let plan = RunPlan::from_config(&cfg)?;
    let parts = Collaborators::production(&cfg, Arc::new(ProcessRunner))?;

    // Ctrl-C -> cancel at the next state boundary.
    let (cancel_handle, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; stopping at the next state boundary");
        cancel_handle.cancel();
    });

    let orchestrator = Orchestrator::new(plan, parts, cancel);
    let report = orchestrator.run().await;
    print_summary(&report);

    Ok(report.exit_code())
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "deploy/Rollout.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Rollout.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// One line on stdout so scripts can grep the verdict.
fn print_summary(report: &RunReport) {
    let revision = report
        .current
        .as_ref()
        .map(|r| r.short().to_string())
        .unwrap_or_else(|| "-".to_string());
    let decision = report
        .decision
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    match &report.result {
        RunResult::Success => println!(
            "rollout: {} updated to {revision} ({decision}): success",
            report.service
        ),
        RunResult::Failure(failure) => println!(
            "rollout: {} at {revision} ({decision}): failed {failure}; rollback: {:?}",
            report.service, report.rollback
        ),
    }
}

fn print_dry_run(cfg: &ConfigFile) {
    println!("rollout dry-run");
    println!("  service.name = {}", cfg.service.name);
    println!(
        "  service.port = {} -> container {}",
        cfg.service.port, cfg.service.container_port
    );
    if let Some(env_file) = &cfg.service.env_file {
        println!("  service.env_file = {}", env_file.display());
    }
    println!();

    println!("source:");
    println!("  root: {}", cfg.source.root.display());
    println!("  remote: {}", cfg.source.remote);
    println!();

    println!("build:");
    println!("  artifact: {}", cfg.build.artifact);
    println!("  context: {}", cfg.build.context.display());
    if let Some(dockerfile) = &cfg.build.dockerfile {
        println!("  dockerfile: {}", dockerfile.display());
    }
    println!("  watch: {:?}", cfg.build.watch);
    println!("  runtime: {}", cfg.runtime.bin);
    println!();

    println!("health:");
    println!("  endpoint: {}", cfg.health.endpoint);
    println!(
        "  attempts: {} every {}s after {}s (probe timeout {}s)",
        cfg.health.max_attempts,
        cfg.health.interval_seconds,
        cfg.health.initial_delay_seconds,
        cfg.health.probe_timeout_seconds
    );
    println!();

    println!("rollout:");
    println!("  on_health_failure: {:?}", cfg.rollout.on_health_failure);
    println!("  lock_dir: {}", cfg.rollout.lock_dir.display());
    if let Some(cmd) = &cfg.rollout.alert_cmd {
        println!("  alert_cmd: {cmd}");
    }

    debug!("dry-run complete (no execution)");
}
