// src/lock.rs

//! Exclusive per-service run lock.
//!
//! Two runs against the same service must never overlap. The lock is an OS
//! advisory lock on `<lock_dir>/<service>.lock`, held for the lifetime of
//! [`RunLock`] and released on drop (or when the process dies).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;
use tracing::debug;

use crate::errors::{Result, RolloutError};

#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock for `service`, failing fast with
    /// [`RolloutError::ConcurrentRun`] if another run holds it.
    pub fn acquire(lock_dir: &Path, service: &str) -> Result<Self> {
        fs::create_dir_all(lock_dir)
            .with_context(|| format!("creating lock directory {}", lock_dir.display()))?;

        let path = lock_path(lock_dir, service);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(RolloutError::ConcurrentRun {
                    service: service.to_string(),
                    path,
                });
            }
            return Err(err.into());
        }

        // Owner pid is informational only.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        debug!(service, path = %path.display(), "run lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "run lock released");
    }
}

/// Lock file for a service; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn lock_path(lock_dir: &Path, service: &str) -> PathBuf {
    let safe: String = service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    lock_dir.join(format!("{safe}.lock"))
}
