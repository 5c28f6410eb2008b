use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The action a file record last went through. Serialized into the tracker
/// file, so the wire names are part of the format.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncAction {
    #[serde(rename = "copy")]
    Copy,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "update_tracker")]
    UpdateTracker,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Copy => "copy",
            SyncAction::Merge => "merge",
            SyncAction::UpdateTracker => "update_tracker",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrStatus {
    Open,
    Closed,
    Merged,
}

impl PrStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PrStatus::Open)
    }
}

/// User-declared pair of a path inside the source repository and a path
/// inside the workspace. Either side may name a file or a directory; `/` or
/// the empty string denote the repository root.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathMapping {
    pub source: String,
    pub local: String,
}

impl PathMapping {
    pub fn is_repo_root(path: &str) -> bool {
        path.is_empty() || path == "/"
    }

    /// Source side normalized to a relative path ("" for the repo root).
    pub fn source_rel(&self) -> &str {
        if Self::is_repo_root(&self.source) {
            ""
        } else {
            self.source.trim_start_matches('/')
        }
    }

    pub fn local_rel(&self) -> &str {
        if Self::is_repo_root(&self.local) {
            ""
        } else {
            self.local.trim_start_matches('/')
        }
    }
}

/// One tracked file, keyed by its workspace-relative path inside a
/// [`RepoRecord`]. `hash` matches the bytes of the local file as of the last
/// successful sync action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub hash: String,
    #[serde(default)]
    pub synced_at: String,
    pub action: SyncAction,
    #[serde(default)]
    pub relative_source_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    pub pr_number: u64,
    pub branch_name: String,
    pub status: PrStatus,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    pub branch: String,
    #[serde(default)]
    pub last_commit_hash: String,
    #[serde(default)]
    pub synced_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_repo: Option<String>,
    #[serde(default)]
    pub file_paths: Vec<PathMapping>,
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRecord>,
}

impl RepoRecord {
    pub fn new(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            last_commit_hash: String::new(),
            synced_at: String::new(),
            fork_repo: None,
            file_paths: Vec::new(),
            files: BTreeMap::new(),
            pull_request: None,
        }
    }

    pub fn record_file(&mut self, relative_local_path: &str, record: FileRecord) {
        self.files.insert(relative_local_path.to_string(), record);
    }

    pub fn drop_file(&mut self, relative_local_path: &str) -> Option<FileRecord> {
        self.files.remove(relative_local_path)
    }
}

/// The whole tracker document: the engine's only durable state. Keyed maps
/// are BTreeMaps so the serialized form is stable across runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerRoot {
    #[serde(default)]
    pub repos: BTreeMap<String, RepoRecord>,
}

impl TrackerRoot {
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn repo(&self, name: &str) -> Option<&RepoRecord> {
        self.repos.get(name)
    }

    pub fn repo_mut(&mut self, name: &str) -> Option<&mut RepoRecord> {
        self.repos.get_mut(name)
    }

    /// Fetch-or-create a repo record. A recorded branch that differs from the
    /// requested one resets commit tracking (the old tip is meaningless on
    /// another branch) but keeps the file records.
    pub fn ensure_repo(&mut self, name: &str, branch: &str) -> &mut RepoRecord {
        let record = self
            .repos
            .entry(name.to_string())
            .or_insert_with(|| RepoRecord::new(branch));
        if record.branch != branch {
            record.branch = branch.to_string();
            record.last_commit_hash = String::new();
        }
        record
    }

    /// Last observed tip for `repo`, or None when the repo is unknown, the
    /// recorded branch differs, or no commit was ever recorded.
    pub fn last_commit(&self, repo: &str, branch: &str) -> Option<&str> {
        let record = self.repos.get(repo)?;
        if record.branch != branch || record.last_commit_hash.is_empty() {
            return None;
        }
        Some(record.last_commit_hash.as_str())
    }

    pub fn file_record(&self, repo: &str, relative_local_path: &str) -> Option<&FileRecord> {
        self.repos.get(repo)?.files.get(relative_local_path)
    }

    pub fn last_file_hash(&self, repo: &str, relative_local_path: &str) -> Option<&str> {
        self.file_record(repo, relative_local_path)
            .map(|record| record.hash.as_str())
    }

    pub fn last_file_action(&self, repo: &str, relative_local_path: &str) -> Option<SyncAction> {
        self.file_record(repo, relative_local_path)
            .map(|record| record.action)
    }
}
