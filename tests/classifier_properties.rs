// tests/classifier_properties.rs
use proptest::prelude::*;
use rollout::classify::{WatchedPaths, classify};
use rollout::config::DEFAULT_WATCH;
use rollout::types::{ChangeSet, RebuildDecision};

fn default_watch() -> WatchedPaths {
    WatchedPaths::new(DEFAULT_WATCH.iter().copied()).unwrap()
}

// Source-looking paths that never collide with a dependency manifest.
fn source_paths() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{1,8}/[a-z_]{1,8}\\.(py|md|html)", 1..12)
}

proptest! {
    #[test]
    fn source_only_changes_never_rebuild(paths in source_paths()) {
        let decision = classify(&ChangeSet::new(paths), &default_watch());
        prop_assert_eq!(decision, RebuildDecision::RestartOnly);
    }

    #[test]
    fn one_manifest_anywhere_forces_a_rebuild(
        paths in source_paths(),
        manifest in proptest::sample::select(DEFAULT_WATCH.to_vec()),
        slot in any::<usize>(),
    ) {
        let mut paths = paths;
        let at = slot % (paths.len() + 1);
        paths.insert(at, manifest.to_string());

        let decision = classify(&ChangeSet::new(paths), &default_watch());
        prop_assert_eq!(decision, RebuildDecision::RebuildAndRestart);
    }

    #[test]
    fn decision_ignores_path_order(
        paths in source_paths(),
        with_manifest in any::<bool>(),
    ) {
        let mut paths = paths;
        if with_manifest {
            paths.push("requirements.txt".to_string());
        }
        let mut reversed = paths.clone();
        reversed.reverse();

        let watched = default_watch();
        prop_assert_eq!(
            classify(&ChangeSet::new(paths), &watched),
            classify(&ChangeSet::new(reversed), &watched)
        );
    }
}

#[test]
fn empty_change_set_is_always_no_action() {
    let empty: Vec<String> = Vec::new();
    assert_eq!(
        classify(&ChangeSet::new(empty), &default_watch()),
        RebuildDecision::NoAction
    );
    assert_eq!(
        classify(&ChangeSet::default(), &WatchedPaths::new(Vec::<String>::new()).unwrap()),
        RebuildDecision::NoAction
    );
}
