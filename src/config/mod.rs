// src/config/mod.rs

//! Configuration loading and validation for rollout.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate required keys and values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    BuildConfig, ConfigFile, HealthConfig, RawBuildSection, RawConfigFile, RawHealthSection,
    RawServiceSection, RolloutSection, RuntimeSection, ServiceConfig, SourceSection,
    DEFAULT_WATCH,
};
pub use validate::validate_environment;
