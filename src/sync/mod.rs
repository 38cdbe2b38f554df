// src/sync/mod.rs

//! Source synchronisation.
//!
//! [`SourceSync`] brings the working tree up to date with the remote branch
//! it tracks and records the revision before and after. Local edits are
//! moved into a timestamped stash first and are never discarded.

pub mod git;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::errors::{Result, SyncError};
use crate::types::{BoxFuture, ChangeSet, Revision};

pub use git::GitVcs;

/// Narrow contract over the version-control tool.
pub trait Vcs: Send + Sync {
    /// Whether the working root is under version control at all.
    fn is_repository(&self) -> BoxFuture<'_, Result<bool>>;

    fn head(&self) -> BoxFuture<'_, Result<Revision>>;

    /// Uncommitted modifications to tracked files.
    fn has_local_changes(&self) -> BoxFuture<'_, Result<bool>>;

    /// Move local modifications into a stash entry named `label`.
    fn stash<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Active branch name, or `None` on a detached HEAD.
    fn current_branch(&self) -> BoxFuture<'_, Result<Option<String>>>;

    /// Fetch `remote/branch` and integrate it without creating merges.
    fn integrate<'a>(&'a self, remote: &'a str, branch: &'a str) -> BoxFuture<'a, Result<()>>;

    fn changed_paths<'a>(
        &'a self,
        previous: &'a Revision,
        current: &'a Revision,
    ) -> BoxFuture<'a, Result<ChangeSet>>;
}

/// Revisions captured around one synchronisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub previous: Revision,
    pub current: Revision,
    /// Name of the stash that received local edits, if there were any.
    pub stash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceSync {
    root: PathBuf,
    remote: String,
}

impl SourceSync {
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
        }
    }

    pub async fn sync(&self, vcs: &dyn Vcs, clock: &dyn Clock) -> Result<SyncOutcome> {
        if !vcs.is_repository().await? {
            return Err(SyncError::NoVcs(self.root.clone()).into());
        }

        let previous = vcs.head().await?;

        let stash = if vcs.has_local_changes().await? {
            let label = stash_label(clock);
            vcs.stash(&label).await?;
            warn!(stash = %label, "local modifications moved to stash");
            Some(label)
        } else {
            None
        };

        let branch = vcs.current_branch().await?.ok_or_else(|| {
            SyncError::ConnectivityOrConflict(
                "HEAD is detached; check out a branch to follow".to_string(),
            )
        })?;

        info!(remote = %self.remote, branch = %branch, "integrating remote state");
        vcs.integrate(&self.remote, &branch).await?;

        let current = vcs.head().await?;
        info!(
            previous = %previous.short(),
            current = %current.short(),
            updated = previous != current,
            "source synchronised"
        );

        Ok(SyncOutcome {
            previous,
            current,
            stash,
        })
    }
}

fn stash_label(clock: &dyn Clock) -> String {
    format!("rollout-autostash-{}", clock.now().format("%Y%m%dT%H%M%SZ"))
}
