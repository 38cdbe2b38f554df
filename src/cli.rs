// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::HealthFailureStrategy;

/// Command-line arguments for `rollout`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rollout",
    version,
    about = "Pull the latest revision, rebuild if needed, restart the service and verify it is healthy.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Relative paths inside the file are resolved against its directory.
    #[arg(long, value_name = "PATH", default_value = "Rollout.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ROLLOUT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan, but don't touch git or the runtime.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[rollout].on_health_failure` (alert-only, auto-rollback).
    #[arg(long, value_name = "STRATEGY")]
    pub on_health_failure: Option<HealthFailureStrategy>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
