// src/clock.rs

//! Time source for the orchestrator.
//!
//! The probe loop and stash naming never touch `tokio::time` or the system
//! clock directly; they go through [`Clock`] so tests can run a full
//! deployment without real delays.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::BoxFuture;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Wall clock plus `tokio::time::sleep`.
#[derive(Debug, Clone, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
