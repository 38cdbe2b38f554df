// tests/common/mod.rs
#![allow(dead_code)]
#![allow(unused_imports)]

pub use rollout_test_utils::builders;
pub use rollout_test_utils::fakes;
pub use rollout_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
