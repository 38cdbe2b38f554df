// src/classify.rs

//! Change classification.
//!
//! Turns the set of paths changed between two revisions into a
//! [`RebuildDecision`]. Classification is a pure function of its inputs:
//! no filesystem access, no VCS calls.

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::types::{ChangeSet, RebuildDecision};

/// Compiled set of path globs whose modification forces a rebuild.
///
/// Patterns are relative to the repository root, e.g. `requirements.txt`,
/// `Dockerfile` or `**/package.json`.
#[derive(Clone)]
pub struct WatchedPaths {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for WatchedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedPaths")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchedPaths {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pat in &patterns {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            builder.add(glob);
        }
        let set = builder.build().context("building watched-path globset")?;
        Ok(Self { patterns, set })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.set.is_match(normalize(rel_path).as_str())
    }
}

/// Classify a change set.
///
/// - empty change set: [`RebuildDecision::NoAction`]
/// - any path matching `watched`: [`RebuildDecision::RebuildAndRestart`],
///   no matter what else changed
/// - anything else: [`RebuildDecision::RestartOnly`]
pub fn classify(changes: &ChangeSet, watched: &WatchedPaths) -> RebuildDecision {
    if changes.is_empty() {
        return RebuildDecision::NoAction;
    }
    if changes.iter().any(|path| watched.matches(path)) {
        RebuildDecision::RebuildAndRestart
    } else {
        RebuildDecision::RestartOnly
    }
}

/// Changed paths that hit a watched pattern, for logging.
pub fn watched_hits<'a>(changes: &'a ChangeSet, watched: &WatchedPaths) -> Vec<&'a str> {
    changes.iter().filter(|p| watched.matches(p)).collect()
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watched() -> WatchedPaths {
        WatchedPaths::new(["requirements.txt", "Dockerfile", "docker-compose*.yml"]).unwrap()
    }

    #[test]
    fn empty_change_set_needs_no_action() {
        assert_eq!(
            classify(&ChangeSet::default(), &watched()),
            RebuildDecision::NoAction
        );
    }

    #[test]
    fn readme_only_is_restart_only() {
        let changes = ChangeSet::new(["README.md", "modules/bind_pdf/core.py"]);
        assert_eq!(classify(&changes, &watched()), RebuildDecision::RestartOnly);
    }

    #[test]
    fn manifest_change_forces_rebuild() {
        let changes = ChangeSet::new(["README.md", "requirements.txt"]);
        assert_eq!(
            classify(&changes, &watched()),
            RebuildDecision::RebuildAndRestart
        );
        assert_eq!(watched_hits(&changes, &watched()), vec!["requirements.txt"]);
    }

    #[test]
    fn glob_patterns_and_dot_prefixes_match() {
        let w = watched();
        assert!(w.matches("docker-compose.prod.yml"));
        assert!(w.matches("./Dockerfile"));
        assert!(!w.matches("docs/requirements.txt.bak"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = WatchedPaths::new(["src/[unterminated"]).unwrap_err();
        assert!(err.to_string().contains("invalid glob pattern"));
    }
}
