use crate::fixtures::*;

use tributary_core::ingest::{self, DeletionChoice, KeepAllPrompt};
use tributary_core::tracker;
use tributary_kernel::digest::hash_bytes;
use tributary_kernel::tracker::SyncAction;
use tributary_kernel::workflow::RepoGroup;

fn run_one(
    ws: &Workspace,
    group: RepoGroup,
    oracle: &dyn tributary_core::oracle::MergeOracle,
    prompt: &dyn tributary_core::ingest::DeletionPrompt,
) -> ingest::RunSummary {
    ingest::ingest_repos(ws.path(), &[group], oracle, prompt).expect("ingest run")
}

#[test]
fn first_time_ingest_copies_and_records() -> TestResult {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    let commit = remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();

    let summary = run_one(&ws, repo_group(&remote, &[("docs", "out")]), &oracle, &KeepAllPrompt);

    assert_eq!(ws.read("out/readme.md"), "v1");
    assert_eq!(summary.repos[0].copied, 1);
    assert!(!summary.has_failures());

    let root = tracker::read(ws.path());
    let record = root.repo(remote.path_str()).expect("repo record");
    assert_eq!(record.last_commit_hash, commit);
    assert_eq!(record.file_paths.len(), 1);
    let file = record.files.get("out/readme.md").expect("file record");
    assert_eq!(file.hash, hash_bytes(b"v1"));
    assert_eq!(file.action, SyncAction::Copy);
    assert_eq!(file.relative_source_path, "docs/readme.md");
    assert!(oracle.calls.borrow().is_empty());
    Ok(())
}

#[test]
fn unchanged_second_run_is_a_noop() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    let commit = remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);

    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);
    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);

    let repo = &summary.repos[0];
    assert_eq!(repo.copied, 0);
    assert_eq!(repo.unchanged, 1);
    assert!(repo.skipped);
    let root = tracker::read(ws.path());
    let record = root.repo(remote.path_str()).unwrap();
    assert_eq!(record.last_commit_hash, commit);
    assert_eq!(
        record.files.get("out/readme.md").unwrap().action,
        SyncAction::Copy
    );
}

#[test]
fn upstream_only_change_overwrites_local() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    remote.write("docs/readme.md", "v2");
    let second = remote.commit_all("second");
    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);

    assert_eq!(ws.read("out/readme.md"), "v2");
    assert_eq!(summary.repos[0].copied, 1);
    let root = tracker::read(ws.path());
    let record = root.repo(remote.path_str()).unwrap();
    assert_eq!(record.last_commit_hash, second);
    let file = record.files.get("out/readme.md").unwrap();
    assert_eq!(file.hash, hash_bytes(b"v2"));
    assert_eq!(file.action, SyncAction::Copy);
    assert!(oracle.calls.borrow().is_empty());
}

#[test]
fn local_only_change_is_preserved() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    ws.write("out/readme.md", "v1-local");

    // sync=false forces a staged pass even though the tip is unchanged, so
    // the decision engine itself is exercised.
    let mut always_fetch = group;
    always_fetch.sync = false;
    let summary = run_one(&ws, always_fetch, &oracle, &KeepAllPrompt);

    assert_eq!(ws.read("out/readme.md"), "v1-local");
    let repo = &summary.repos[0];
    assert!(!repo.skipped);
    assert_eq!(repo.unchanged, 1);
    assert_eq!(repo.copied, 0);
    let root = tracker::read(ws.path());
    let file = root
        .repo(remote.path_str())
        .unwrap()
        .files
        .get("out/readme.md")
        .cloned()
        .unwrap();
    assert_eq!(file.hash, hash_bytes(b"v1"));
    assert!(oracle.calls.borrow().is_empty());
}

#[test]
fn divergent_change_invokes_the_merge_oracle() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    ws.write("out/readme.md", "v1-local");
    remote.write("docs/readme.md", "v1-upstream");
    let second = remote.commit_all("second");

    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);

    let merged = SyntheticOracle::merged_output("v1-local", "v1-upstream");
    assert_eq!(ws.read("out/readme.md"), merged);
    assert_eq!(summary.repos[0].merged, 1);
    assert_eq!(
        oracle.calls.borrow().as_slice(),
        &[("v1-local".to_string(), "v1-upstream".to_string())]
    );

    let root = tracker::read(ws.path());
    let record = root.repo(remote.path_str()).unwrap();
    assert_eq!(record.last_commit_hash, second);
    let file = record.files.get("out/readme.md").unwrap();
    assert_eq!(file.action, SyncAction::Merge);
    assert_eq!(file.hash, hash_bytes(merged.as_bytes()));
    // Success cleans up the sidecar backup.
    assert!(!ws.exists("out/readme.md.tributary-backup"));
}

#[test]
fn merged_file_is_left_alone_until_upstream_moves() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    ws.write("out/readme.md", "v1-local");
    remote.write("docs/readme.md", "v1-upstream");
    remote.commit_all("second");
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);
    assert_eq!(oracle.calls.borrow().len(), 1);

    // Commit unchanged: the merge gate holds even through a forced stage.
    let mut always_fetch = group.clone();
    always_fetch.sync = false;
    let summary = run_one(&ws, always_fetch, &oracle, &KeepAllPrompt);
    assert_eq!(oracle.calls.borrow().len(), 1);
    assert_eq!(summary.repos[0].unchanged, 1);

    // Upstream advances: the same file merges again, against the new source.
    remote.write("docs/readme.md", "v2-upstream");
    remote.commit_all("third");
    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);
    assert_eq!(summary.repos[0].merged, 1);

    let first_merge = SyntheticOracle::merged_output("v1-local", "v1-upstream");
    let calls = oracle.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], (first_merge.clone(), "v2-upstream".to_string()));
    assert_eq!(
        ws.read("out/readme.md"),
        SyntheticOracle::merged_output(&first_merge, "v2-upstream")
    );
}

#[test]
fn stale_tracker_with_matching_sides_only_updates_bookkeeping() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    // Out-of-band sync: both sides already agree on v2, tracker still at v1.
    remote.write("docs/readme.md", "v2");
    remote.commit_all("second");
    ws.write("out/readme.md", "v2");

    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);

    assert_eq!(summary.repos[0].tracker_updated, 1);
    assert_eq!(summary.repos[0].copied, 0);
    assert_eq!(ws.read("out/readme.md"), "v2");
    let root = tracker::read(ws.path());
    let file = root
        .repo(remote.path_str())
        .unwrap()
        .files
        .get("out/readme.md")
        .cloned()
        .unwrap();
    assert_eq!(file.hash, hash_bytes(b"v2"));
    assert_eq!(file.action, SyncAction::UpdateTracker);
    assert!(oracle.calls.borrow().is_empty());
}

#[test]
fn force_overwrites_local_edits() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);

    ws.write("out/readme.md", "v1-local");
    let mut forced = group;
    forced.force = true;
    let summary = run_one(&ws, forced, &oracle, &KeepAllPrompt);

    assert_eq!(ws.read("out/readme.md"), "v1");
    assert_eq!(summary.repos[0].copied, 1);
    assert!(oracle.calls.borrow().is_empty());
}

#[test]
fn sync_disabled_always_stages_but_stays_idempotent() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let oracle = SyntheticOracle::new();
    let mut group = repo_group(&remote, &[("docs", "out")]);
    group.sync = false;

    run_one(&ws, group.clone(), &oracle, &KeepAllPrompt);
    let summary = run_one(&ws, group, &oracle, &KeepAllPrompt);

    let repo = &summary.repos[0];
    assert!(!repo.skipped);
    assert_eq!(repo.copied, 0);
    assert_eq!(repo.unchanged, 1);
}

#[test]
fn merge_failure_leaves_file_backup_and_tracker_untouched() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    ws.write("out/readme.md", "v1-local");
    remote.write("docs/readme.md", "v1-upstream");
    let second = remote.commit_all("second");

    let summary = run_one(&ws, group, &FailingOracle, &KeepAllPrompt);

    assert_eq!(ws.read("out/readme.md"), "v1-local");
    assert_eq!(ws.read("out/readme.md.tributary-backup"), "v1-local");
    assert_eq!(summary.repos[0].failed, 1);
    assert!(summary.has_failures());

    let root = tracker::read(ws.path());
    let record = root.repo(remote.path_str()).unwrap();
    // File record still describes the last successful action.
    let file = record.files.get("out/readme.md").unwrap();
    assert_eq!(file.hash, hash_bytes(b"v1"));
    assert_eq!(file.action, SyncAction::Copy);
    // The repo pass itself completed, so the observed tip advances and the
    // next run retries the merge from the decision table.
    assert_eq!(record.last_commit_hash, second);
}

#[test]
fn single_file_mapping_lands_at_the_declared_path() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.commit_all("initial");
    let ws = Workspace::new();

    let group = repo_group(&remote, &[("docs/readme.md", "notes/copy.md")]);
    run_one(&ws, group, &SyntheticOracle::new(), &KeepAllPrompt);

    assert_eq!(ws.read("notes/copy.md"), "v1");
    let root = tracker::read(ws.path());
    let file = root
        .repo(remote.path_str())
        .unwrap()
        .files
        .get("notes/copy.md")
        .cloned()
        .unwrap();
    assert_eq!(file.relative_source_path, "docs/readme.md");
}

#[test]
fn missing_branch_fails_the_repo_without_touching_the_tracker() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    let commit = remote.commit_all("initial");
    let ws = Workspace::new();
    let good = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, good.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    let mut bad = good.clone();
    bad.branch = "definitely-missing".to_string();
    let summary = run_one(&ws, bad, &SyntheticOracle::new(), &KeepAllPrompt);

    assert!(summary.repos[0].error.is_some());
    assert!(summary.has_failures());
    let root = tracker::read(ws.path());
    assert_eq!(
        root.last_commit(remote.path_str(), &good.branch),
        Some(commit.as_str())
    );
}

#[test]
fn deletion_candidates_are_bounded_to_tracked_files() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.write("docs/extra.md", "x");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    // An untracked neighbor must never become a candidate.
    ws.write("out/scratch.md", "mine");
    remote.remove("docs/extra.md");
    remote.commit_all("drop extra");

    let prompt = ScriptedPrompt::new(DeletionChoice::DeleteAll);
    let summary = run_one(&ws, group, &SyntheticOracle::new(), &prompt);

    assert_eq!(
        prompt.asked.borrow().as_slice(),
        &[vec!["out/extra.md".to_string()]]
    );
    assert!(!ws.exists("out/extra.md"));
    assert!(ws.exists("out/scratch.md"));
    assert!(ws.exists("out/readme.md"));
    assert_eq!(summary.repos[0].deleted, 1);

    let root = tracker::read(ws.path());
    assert!(
        !root
            .repo(remote.path_str())
            .unwrap()
            .files
            .contains_key("out/extra.md")
    );
}

#[test]
fn keeping_deletion_candidates_changes_nothing() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.write("docs/extra.md", "x");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    remote.remove("docs/extra.md");
    remote.commit_all("drop extra");

    let prompt = ScriptedPrompt::new(DeletionChoice::Keep);
    let summary = run_one(&ws, group, &SyntheticOracle::new(), &prompt);

    assert_eq!(prompt.asked.borrow().len(), 1);
    assert!(ws.exists("out/extra.md"));
    assert_eq!(summary.repos[0].deleted, 0);
    let root = tracker::read(ws.path());
    assert!(
        root.repo(remote.path_str())
            .unwrap()
            .files
            .contains_key("out/extra.md")
    );
}

#[test]
fn subset_deletion_removes_only_the_chosen_files() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.write("docs/a.md", "a");
    remote.write("docs/b.md", "b");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    remote.remove("docs/a.md");
    remote.remove("docs/b.md");
    remote.commit_all("drop both");

    let prompt = ScriptedPrompt::new(DeletionChoice::Subset(vec!["out/b.md".to_string()]));
    let summary = run_one(&ws, group, &SyntheticOracle::new(), &prompt);

    assert!(ws.exists("out/a.md"));
    assert!(!ws.exists("out/b.md"));
    assert_eq!(summary.repos[0].deleted, 1);
}

#[test]
fn deleting_the_last_file_prunes_empty_directories() {
    let remote = RemoteRepo::new();
    remote.write("docs/readme.md", "v1");
    remote.write("docs/nested/deep.md", "x");
    remote.commit_all("initial");
    let ws = Workspace::new();
    let group = repo_group(&remote, &[("docs", "out")]);
    run_one(&ws, group.clone(), &SyntheticOracle::new(), &KeepAllPrompt);

    remote.remove("docs/nested/deep.md");
    remote.commit_all("drop nested");

    let prompt = ScriptedPrompt::new(DeletionChoice::DeleteAll);
    run_one(&ws, group, &SyntheticOracle::new(), &prompt);

    assert!(!ws.exists("out/nested/deep.md"));
    assert!(!ws.exists("out/nested"));
    assert!(ws.exists("out/readme.md"));
}
