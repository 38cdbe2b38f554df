// src/exec/mod.rs

//! External process execution.
//!
//! Every real adapter (git, docker, the alert hook) talks to the outside
//! world through a [`CommandRunner`]. Production uses [`ProcessRunner`],
//! which spawns processes with `tokio::process::Command` and captures their
//! output; tests can substitute a runner that replays canned output.

pub mod command;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
