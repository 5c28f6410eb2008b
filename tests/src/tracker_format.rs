use crate::fixtures::*;

use tributary_core::tracker;
use tributary_kernel::tracker::{
    FileRecord, PathMapping, PrStatus, PullRequestRecord, SyncAction, TrackerRoot,
};

fn populated_root() -> TrackerRoot {
    let mut root = TrackerRoot::default();
    let repo = root.ensure_repo("owner/repo1", "main");
    repo.last_commit_hash = "abc123".to_string();
    repo.synced_at = "2026-08-01T00:00:00+00:00".to_string();
    repo.fork_repo = Some("user/repo1-fork".to_string());
    repo.file_paths.push(PathMapping {
        source: "docs".to_string(),
        local: "out".to_string(),
    });
    repo.record_file(
        "out/readme.md",
        FileRecord {
            hash: "feedface".to_string(),
            synced_at: "2026-08-01T00:00:00+00:00".to_string(),
            action: SyncAction::Merge,
            relative_source_path: "docs/readme.md".to_string(),
        },
    );
    repo.pull_request = Some(PullRequestRecord {
        pr_number: 7,
        branch_name: "contribute-20260801-120000".to_string(),
        status: PrStatus::Open,
        last_updated: "2026-08-01T00:00:00+00:00".to_string(),
    });
    root
}

#[test]
fn persisted_tracker_uses_the_wire_field_names() -> TestResult {
    let dir = TempDir::new()?;
    tracker::write(dir.path(), &populated_root())?;

    let raw = std::fs::read_to_string(tracker::tracker_path(dir.path()))?;
    for key in [
        "\"lastCommitHash\"",
        "\"forkRepo\"",
        "\"filePaths\"",
        "\"relativeSourcePath\"",
        "\"prNumber\"",
        "\"branchName\"",
        "\"syncedAt\"",
    ] {
        assert!(raw.contains(key), "missing {key} in {raw}");
    }
    assert!(raw.contains("\"merge\""));
    assert!(raw.contains("\"open\""));
    Ok(())
}

#[test]
fn round_trip_preserves_every_understood_field() -> TestResult {
    let dir = TempDir::new()?;
    let root = populated_root();
    tracker::write(dir.path(), &root)?;
    let back = tracker::read(dir.path());
    assert_eq!(back, root);
    Ok(())
}

/// A tracker written by another tool or an earlier version still parses,
/// unknown fields and all.
#[test]
fn externally_authored_document_parses() {
    let raw = r#"{
        "repos": {
            "owner/repo1": {
                "branch": "main",
                "lastCommitHash": "abc123",
                "syncedAt": "2026-08-01T00:00:00+00:00",
                "forkRepo": "user/repo1-fork",
                "filePaths": [ { "source": "docs", "local": "out" } ],
                "files": {
                    "out/readme.md": {
                        "hash": "feedface",
                        "syncedAt": "2026-08-01T00:00:00+00:00",
                        "action": "update_tracker",
                        "relativeSourcePath": "docs/readme.md"
                    }
                },
                "pullRequest": {
                    "prNumber": 7,
                    "branchName": "contribute-20260801-120000",
                    "status": "merged",
                    "lastUpdated": "2026-08-01T00:00:00+00:00"
                },
                "futureField": [1, 2, 3]
            }
        }
    }"#;

    let root: TrackerRoot = serde_json::from_str(raw).expect("spec-shaped document");
    let record = root.repo("owner/repo1").unwrap();
    assert_eq!(record.last_commit_hash, "abc123");
    assert_eq!(record.fork_repo.as_deref(), Some("user/repo1-fork"));
    assert_eq!(
        root.last_file_action("owner/repo1", "out/readme.md"),
        Some(SyncAction::UpdateTracker)
    );
    assert_eq!(
        record.pull_request.as_ref().map(|pr| pr.status),
        Some(PrStatus::Merged)
    );
}

#[test]
fn malformed_tracker_degrades_to_an_empty_ledger() -> TestResult {
    let dir = TempDir::new()?;
    std::fs::write(tracker::tracker_path(dir.path()), "]{ definitely not json")?;
    assert!(tracker::read(dir.path()).is_empty());
    Ok(())
}
