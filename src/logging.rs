// src/logging.rs

//! Logging setup for `rollout`: `tracing` + `tracing-subscriber`, to STDERR.
//!
//! Filter priority:
//! 1. `--log-level` CLI flag
//! 2. `ROLLOUT_LOG`, any `EnvFilter` directive string (`debug`,
//!    `rollout=trace,reqwest=info`, ...)
//! 3. `info`
//!
//! HTTP client internals are capped at `warn` unless a directive names them.
//! Stdout only carries the dry-run plan and the final run summary.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "ROLLOUT_LOG";

const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directives = match (cli_level, env.map(str::trim)) {
        (Some(level), _) => level_directive(level).to_string(),
        (None, Some(env)) if !env.is_empty() => env.to_string(),
        _ => "info".to_string(),
    };

    let mut filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} (from --log-level or {LOG_ENV})"))?;
    for target in NOISY_TARGETS {
        if !directives.contains(target) {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn flag_beats_environment() {
        let filter = build_filter(Some(LogLevel::Debug), Some("error")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn environment_directives_are_used_verbatim() {
        let filter = build_filter(None, Some(" trace ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn default_is_info() {
        let filter = build_filter(None, None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));

        let filter = build_filter(None, Some("  ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
