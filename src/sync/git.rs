// src/sync/git.rs

//! `git` CLI adapter for [`Vcs`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};

use crate::errors::{Result, SyncError};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::types::{BoxFuture, ChangeSet, Revision};

use super::Vcs;

pub struct GitVcs {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
}

impl GitVcs {
    pub fn new(runner: Arc<dyn CommandRunner>, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    async fn git<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new("git").args(args).current_dir(&self.root);
        self.runner.run(&spec).await
    }

    /// Run git and treat a non-zero exit as an error.
    async fn git_ok<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let out = self.git(args.clone()).await?;
        if !out.success() {
            return Err(anyhow!(
                "git {} failed ({}): {}",
                args.join(" "),
                out.code,
                out.combined()
            )
            .into());
        }
        Ok(out)
    }
}

impl Vcs for GitVcs {
    fn is_repository(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if !self.root.is_dir() {
                return Ok(false);
            }
            // The root itself must be the top of a work tree; a plain
            // directory nested inside some other checkout does not count.
            let out = self.git(["rev-parse", "--show-toplevel"]).await?;
            if !out.success() || out.stdout_trimmed().is_empty() {
                return Ok(false);
            }
            let toplevel = std::fs::canonicalize(out.stdout_trimmed())
                .with_context(|| format!("resolving {}", out.stdout_trimmed()))?;
            let root = std::fs::canonicalize(&self.root)
                .with_context(|| format!("resolving {}", self.root.display()))?;
            Ok(toplevel == root)
        })
    }

    fn head(&self) -> BoxFuture<'_, Result<Revision>> {
        Box::pin(async move {
            let out = self.git_ok(["rev-parse", "HEAD"]).await?;
            let sha = out.stdout_trimmed();
            if sha.is_empty() {
                return Err(anyhow!("git rev-parse HEAD returned empty output").into());
            }
            Ok(Revision::new(sha))
        })
    }

    fn has_local_changes(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let out = self
                .git_ok(["status", "--porcelain", "--untracked-files=no"])
                .await?;
            Ok(!out.stdout_trimmed().is_empty())
        })
    }

    fn stash<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.git_ok(["stash", "push", "-m", label]).await?;
            Ok(())
        })
    }

    fn current_branch(&self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move {
            let out = self.git(["symbolic-ref", "--short", "-q", "HEAD"]).await?;
            let name = out.stdout_trimmed();
            if out.success() && !name.is_empty() {
                Ok(Some(name.to_string()))
            } else {
                Ok(None)
            }
        })
    }

    fn integrate<'a>(&'a self, remote: &'a str, branch: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = self.git(["pull", "--ff-only", remote, branch]).await?;
            if !out.success() {
                return Err(SyncError::ConnectivityOrConflict(format!(
                    "git pull --ff-only {remote} {branch} exited with {}: {}",
                    out.code,
                    out.combined()
                ))
                .into());
            }
            Ok(())
        })
    }

    fn changed_paths<'a>(
        &'a self,
        previous: &'a Revision,
        current: &'a Revision,
    ) -> BoxFuture<'a, Result<ChangeSet>> {
        Box::pin(async move {
            if previous == current {
                return Ok(ChangeSet::default());
            }
            let out = self
                .git_ok([
                    "diff",
                    "--name-only",
                    "--no-renames",
                    "-z",
                    previous.as_str(),
                    current.as_str(),
                ])
                .await?;
            Ok(parse_name_list(&out.stdout))
        })
    }
}

/// Split NUL-terminated `--name-only -z` output. Renames are listed under
/// both paths (`--no-renames`) and nothing is quoted.
fn parse_name_list(stdout: &str) -> ChangeSet {
    ChangeSet::new(stdout.split('\0').filter(|p| !p.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_list_keeps_spaces_and_non_ascii_verbatim() {
        let changes = parse_name_list("requirements.txt\0docs/résumé v2.md\0");
        assert_eq!(
            changes.iter().collect::<Vec<_>>(),
            vec!["requirements.txt", "docs/résumé v2.md"]
        );
        assert!(parse_name_list("").is_empty());
    }
}
