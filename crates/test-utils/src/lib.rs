//! Shared fixtures for `rollout` tests: config builders, in-memory
//! collaborators and tracing setup.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

/// Longest any single test may take. Fakes never wait, so hitting this
/// means the code under test is stuck.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Capture `tracing` output per test (`RUST_LOG` overrides the
/// `info,rollout=debug` default). Output shows up only for failing tests
/// unless `-- --nocapture` is passed.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,rollout=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `fut`, panicking once [`TEST_DEADLINE`] has passed.
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, fut).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {TEST_DEADLINE:?}"),
    }
}
