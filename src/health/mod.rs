// src/health/mod.rs

//! Post-switch health verification.
//!
//! A fixed-interval bounded retry loop, not exponential backoff: the worst
//! case wait is always `initial_delay + max_attempts * interval`.

pub mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::types::{BoxFuture, HealthStatus};

pub use http::HttpProbe;

/// JSON body served by the health endpoint, e.g.
/// `{"status": "healthy", "modules": {"bind_pdf": true}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// A successful probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub status_code: u16,
    /// Parsed body, when the endpoint returned JSON.
    pub body: Option<HealthBody>,
}

/// One health check against `endpoint`.
///
/// `Ok` means the endpoint answered with a success status within the
/// probe's own timeout; anything else is a failed probe.
pub trait HealthProbe: Send + Sync {
    fn probe<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, anyhow::Result<ProbeReport>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPolicy {
    pub endpoint: String,
    pub max_attempts: u32,
    pub interval: Duration,
    pub initial_delay: Duration,
}

/// Result of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthVerdict {
    pub status: HealthStatus,
    /// Probes actually sent.
    pub probes: u32,
    pub endpoint: String,
}

/// Wait `initial_delay`, then probe up to `max_attempts` times, `interval`
/// apart. Returns `Healthy` on the first successful probe and `Unhealthy`
/// only once every attempt has failed. There is no sleep after the last
/// probe.
pub async fn verify(probe: &dyn HealthProbe, clock: &dyn Clock, policy: &HealthPolicy) -> HealthVerdict {
    if !policy.initial_delay.is_zero() {
        debug!(delay_ms = policy.initial_delay.as_millis() as u64, "waiting for warm-up");
        clock.sleep(policy.initial_delay).await;
    }

    for attempt in 1..=policy.max_attempts {
        match probe.probe(&policy.endpoint).await {
            Ok(report) => {
                log_report(&report, attempt);
                return HealthVerdict {
                    status: HealthStatus::Healthy,
                    probes: attempt,
                    endpoint: policy.endpoint.clone(),
                };
            }
            Err(err) => {
                warn!(
                    endpoint = %policy.endpoint,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "health probe failed"
                );
            }
        }

        if attempt < policy.max_attempts {
            clock.sleep(policy.interval).await;
        }
    }

    HealthVerdict {
        status: HealthStatus::Unhealthy,
        probes: policy.max_attempts,
        endpoint: policy.endpoint.clone(),
    }
}

fn log_report(report: &ProbeReport, attempt: u32) {
    let status = report
        .body
        .as_ref()
        .and_then(|b| b.status.as_deref())
        .unwrap_or("-");
    info!(attempt, http_status = report.status_code, status, "service healthy");

    if let Some(body) = &report.body {
        for (module, state) in &body.modules {
            debug!(module = %module, state = %state, "module readiness");
        }
    }
}
