use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tributary_kernel::decision::{Decision, DecisionInput, decide};
use tributary_kernel::digest::{hash_bytes, hash_file};
use tributary_kernel::tracker::{FileRecord, SyncAction, TrackerRoot};
use tributary_kernel::workflow::RepoGroup;

use crate::display;
use crate::oracle::MergeOracle;
use crate::tracker;
use crate::vcs;
use crate::walker::{self, MERGE_BACKUP_SUFFIX, OpKind, SyncOperation};

/// What the operator chose to do with deletion candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeletionChoice {
    DeleteAll,
    Subset(Vec<String>),
    Keep,
}

/// Confirmation seam for C7. The CLI supplies an interactive implementation;
/// non-interactive runs keep everything.
pub trait DeletionPrompt {
    fn choose(&self, repo: &str, candidates: &[String]) -> DeletionChoice;
}

/// Default prompt for non-interactive runs: never delete.
pub struct KeepAllPrompt;

impl DeletionPrompt for KeepAllPrompt {
    fn choose(&self, _repo: &str, _candidates: &[String]) -> DeletionChoice {
        DeletionChoice::Keep
    }
}

#[derive(Clone, Debug, Default)]
pub struct RepoSummary {
    pub repo: String,
    pub copied: usize,
    pub unchanged: usize,
    pub merged: usize,
    pub tracker_updated: usize,
    pub failed: usize,
    pub deleted: usize,
    pub skipped: bool,
    pub error: Option<String>,
}

impl RepoSummary {
    fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            ..Self::default()
        }
    }

    fn failed_repo(repo: &str, error: String) -> Self {
        Self {
            repo: repo.to_string(),
            error: Some(error),
            ..Self::default()
        }
    }
}

impl fmt::Display for RepoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "{}: failed ({error})", self.repo);
        }
        write!(
            f,
            "{}: {} copied, {} unchanged, {} merged, {} tracker-updated, {} failed, {} deleted",
            self.repo,
            self.copied,
            self.unchanged,
            self.merged,
            self.tracker_updated,
            self.failed,
            self.deleted
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub repos: Vec<RepoSummary>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.repos
            .iter()
            .any(|repo| repo.failed > 0 || repo.error.is_some())
    }

    pub fn extend(&mut self, other: RunSummary) {
        self.repos.extend(other.repos);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mut copied, mut unchanged, mut merged, mut updated, mut failed, mut deleted) =
            (0, 0, 0, 0, 0, 0);
        for repo in &self.repos {
            copied += repo.copied;
            unchanged += repo.unchanged;
            merged += repo.merged;
            updated += repo.tracker_updated;
            failed += repo.failed;
            deleted += repo.deleted;
        }
        write!(
            f,
            "{} repos: {copied} copied, {unchanged} unchanged, {merged} merged, {updated} tracker-updated, {failed} failed, {deleted} deleted",
            self.repos.len()
        )
    }
}

/// Drive the ingest phase across one run's repo groups. Repos are processed
/// sequentially; a repo-scoped failure is logged and counted, and the run
/// moves on. Tracker write failures abort the run.
pub fn ingest_repos(
    workspace: &Path,
    groups: &[RepoGroup],
    oracle: &dyn MergeOracle,
    prompt: &dyn DeletionPrompt,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let mut root = tracker::read(workspace);
    let mut summaries = Vec::new();

    for group in groups {
        match ingest_one(workspace, group, &mut root, oracle, prompt) {
            Ok(summary) => {
                if !summary.skipped {
                    tracker::write(workspace, &root)?;
                }
                display::emit(format!("{summary}"));
                summaries.push(summary);
            }
            Err(err) => {
                display::error(format!("{}: {err}", group.repo));
                // File records that already landed describe bytes on disk;
                // keep them even though the repo pass failed. The commit hash
                // is deliberately not advanced, so the next run retries.
                tracker::write(workspace, &root)?;
                summaries.push(RepoSummary::failed_repo(&group.repo, err.to_string()));
            }
        }
    }

    Ok(RunSummary { repos: summaries })
}

fn ingest_one(
    workspace: &Path,
    group: &RepoGroup,
    root: &mut TrackerRoot,
    oracle: &dyn MergeOracle,
    prompt: &dyn DeletionPrompt,
) -> Result<RepoSummary, Box<dyn std::error::Error>> {
    let mut summary = RepoSummary::new(&group.repo);

    let tip = vcs::tip_commit(&group.repo, &group.branch)
        .map_err(|err| format!("cannot resolve {}@{}: {err}", group.repo, group.branch))?;
    let last_commit = root
        .last_commit(&group.repo, &group.branch)
        .map(str::to_string);

    let should_fetch =
        group.force || !group.sync || last_commit.as_deref() != Some(tip.as_str());
    if !should_fetch {
        summary.skipped = true;
        summary.unchanged = root
            .repo(&group.repo)
            .map(|record| record.files.len())
            .unwrap_or_default();
        display::info(format!(
            "{}: already at {}, nothing to fetch",
            group.repo,
            &tip[..tip.len().min(8)]
        ));
        return Ok(summary);
    }

    let snapshot = vcs::stage_snapshot(&group.repo, &group.branch)?;
    let current_commit = snapshot.commit().to_string();
    display::debug(format!(
        "{}: staged {} at {}",
        group.repo,
        snapshot.root().display(),
        &current_commit[..current_commit.len().min(8)]
    ));

    let mut ops: Vec<SyncOperation> = Vec::new();
    for mapping in &group.files {
        let source_abs = snapshot.root().join(mapping.source_rel());
        let local_abs = workspace.join(mapping.local_rel());

        if source_abs.is_dir() {
            ops.extend(walker::collect_source_ops(
                &source_abs,
                &local_abs,
                snapshot.root(),
                workspace,
                &group.repo,
            )?);
        } else if source_abs.is_file() {
            let local_abs = if local_abs.is_dir() {
                // Directory target for a single file: keep the source name.
                match source_abs.file_name() {
                    Some(name) => local_abs.join(name),
                    None => local_abs,
                }
            } else {
                local_abs
            };
            if let Some(parent) = local_abs.parent() {
                std::fs::create_dir_all(parent)?;
            }
            ops.push(SyncOperation {
                relative_source_path: walker::rel_string(&source_abs, snapshot.root()),
                relative_local_path: walker::rel_string(&local_abs, workspace),
                absolute_source_path: source_abs,
                absolute_local_path: local_abs,
                repo: group.repo.clone(),
                op: OpKind::Copy,
            });
        } else {
            display::warn(format!(
                "{}: source path {} does not exist in the snapshot",
                group.repo, mapping.source
            ));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    for op in &ops {
        apply_operation(
            op,
            group,
            root,
            &last_commit,
            &current_commit,
            &now,
            oracle,
            &mut summary,
        );
    }

    detect_and_apply_deletions(workspace, group, snapshot.root(), root, prompt, &mut summary);

    let record = root.ensure_repo(&group.repo, &group.branch);
    record.last_commit_hash = current_commit;
    record.synced_at = now;
    record.file_paths = group.files.clone();
    if group.fork_repo.is_some() {
        record.fork_repo = group.fork_repo.clone();
    }

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn apply_operation(
    op: &SyncOperation,
    group: &RepoGroup,
    root: &mut TrackerRoot,
    last_commit: &Option<String>,
    current_commit: &str,
    now: &str,
    oracle: &dyn MergeOracle,
    summary: &mut RepoSummary,
) {
    let source_hash = hash_file(&op.absolute_source_path);
    if source_hash.is_empty() {
        display::warn(format!(
            "{}: cannot read staged {}",
            group.repo, op.relative_source_path
        ));
        summary.failed += 1;
        return;
    }
    let local_hash = hash_file(&op.absolute_local_path);
    let tracker_hash = root
        .last_file_hash(&group.repo, &op.relative_local_path)
        .map(str::to_string);
    let tracker_action = root.last_file_action(&group.repo, &op.relative_local_path);

    let decision = decide(&DecisionInput {
        source_hash: &source_hash,
        local_hash: &local_hash,
        tracker_hash: tracker_hash.as_deref(),
        tracker_action,
        last_commit: last_commit.as_deref(),
        current_commit,
        force: group.force,
    });

    match decision {
        Decision::None => {
            summary.unchanged += 1;
        }
        Decision::Copy => match std::fs::copy(&op.absolute_source_path, &op.absolute_local_path) {
            Ok(_) => {
                record_file(root, group, op, &source_hash, SyncAction::Copy, now);
                display::info(format!(
                    "copy {} -> {}",
                    op.relative_source_path, op.relative_local_path
                ));
                summary.copied += 1;
            }
            Err(err) => {
                display::error(format!(
                    "{}: copy to {} failed: {err}",
                    group.repo, op.relative_local_path
                ));
                summary.failed += 1;
            }
        },
        Decision::UpdateTracker => {
            record_file(root, group, op, &local_hash, SyncAction::UpdateTracker, now);
            summary.tracker_updated += 1;
        }
        Decision::Merge => {
            apply_merge(op, group, root, oracle, now, summary);
        }
    }
}

fn apply_merge(
    op: &SyncOperation,
    group: &RepoGroup,
    root: &mut TrackerRoot,
    oracle: &dyn MergeOracle,
    now: &str,
    summary: &mut RepoSummary,
) {
    let local_content = match std::fs::read_to_string(&op.absolute_local_path) {
        Ok(content) => content,
        Err(err) => {
            display::error(format!(
                "{}: cannot read {} for merge: {err}",
                group.repo, op.relative_local_path
            ));
            summary.failed += 1;
            return;
        }
    };
    let source_content = match std::fs::read_to_string(&op.absolute_source_path) {
        Ok(content) => content,
        Err(err) => {
            display::error(format!(
                "{}: cannot read staged {} for merge: {err}",
                group.repo, op.relative_source_path
            ));
            summary.failed += 1;
            return;
        }
    };

    let backup_path = merge_backup_path(&op.absolute_local_path);
    if let Err(err) = std::fs::copy(&op.absolute_local_path, &backup_path) {
        display::error(format!(
            "{}: cannot back up {} before merge: {err}",
            group.repo, op.relative_local_path
        ));
        summary.failed += 1;
        return;
    }

    match oracle.merge(&local_content, &source_content) {
        Ok(merged) => {
            if let Err(err) = std::fs::write(&op.absolute_local_path, &merged) {
                display::error(format!(
                    "{}: cannot write merged {}: {err}",
                    group.repo, op.relative_local_path
                ));
                summary.failed += 1;
                return;
            }
            record_file(
                root,
                group,
                op,
                &hash_bytes(merged.as_bytes()),
                SyncAction::Merge,
                now,
            );
            let _ = std::fs::remove_file(&backup_path);
            display::info(format!(
                "merge {} <- {}",
                op.relative_local_path, op.relative_source_path
            ));
            summary.merged += 1;
        }
        Err(err) => {
            // Local bytes are untouched; the backup stays for inspection and
            // the tracker keeps its previous view of the file.
            display::error(format!(
                "{}: merge of {} failed: {err} (backup kept at {})",
                group.repo,
                op.relative_local_path,
                backup_path.display()
            ));
            summary.failed += 1;
        }
    }
}

fn merge_backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(MERGE_BACKUP_SUFFIX);
    path.with_file_name(name)
}

fn record_file(
    root: &mut TrackerRoot,
    group: &RepoGroup,
    op: &SyncOperation,
    hash: &str,
    action: SyncAction,
    now: &str,
) {
    let record = root.ensure_repo(&group.repo, &group.branch);
    record.record_file(
        &op.relative_local_path,
        FileRecord {
            hash: hash.to_string(),
            synced_at: now.to_string(),
            action,
            relative_source_path: op.relative_source_path.clone(),
        },
    );
}

/// C7: files under a directory mapping's local target that vanished from the
/// source snapshot. Only tracked files qualify; everything else is out of
/// scope no matter how orphaned it looks.
fn detect_and_apply_deletions(
    workspace: &Path,
    group: &RepoGroup,
    stage_root: &Path,
    root: &mut TrackerRoot,
    prompt: &dyn DeletionPrompt,
    summary: &mut RepoSummary,
) {
    let tracked: HashSet<String> = root
        .repo(&group.repo)
        .map(|record| record.files.keys().cloned().collect())
        .unwrap_or_default();
    if tracked.is_empty() {
        return;
    }

    for mapping in &group.files {
        let source_root = stage_root.join(mapping.source_rel());
        if !source_root.is_dir() {
            continue;
        }
        let local_root = workspace.join(mapping.local_rel());

        let present: HashSet<String> = walker::walk_files(&source_root)
            .into_iter()
            .filter_map(|path| {
                path.strip_prefix(&source_root)
                    .ok()
                    .map(|rel| walker::rel_string(&local_root.join(rel), workspace))
            })
            .collect();

        let candidates: Vec<String> = walker::walk_files(&local_root)
            .into_iter()
            .map(|path| walker::rel_string(&path, workspace))
            .filter(|rel| !present.contains(rel) && tracked.contains(rel))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let chosen: Vec<String> = match prompt.choose(&group.repo, &candidates) {
            DeletionChoice::Keep => continue,
            DeletionChoice::DeleteAll => candidates,
            DeletionChoice::Subset(selected) => selected
                .into_iter()
                .filter(|rel| candidates.contains(rel))
                .collect(),
        };

        for rel in chosen {
            let absolute = workspace.join(&rel);
            match std::fs::remove_file(&absolute) {
                Ok(()) => {
                    if let Some(record) = root.repo_mut(&group.repo) {
                        record.drop_file(&rel);
                    }
                    if let Some(parent) = absolute.parent() {
                        prune_empty_dirs(workspace, parent);
                    }
                    display::info(format!("delete {rel}"));
                    summary.deleted += 1;
                }
                Err(err) => {
                    display::error(format!("{}: cannot delete {rel}: {err}", group.repo));
                    summary.failed += 1;
                }
            }
        }
    }
}

fn prune_empty_dirs(workspace: &Path, start: &Path) {
    let mut dir = start.to_path_buf();
    while dir != workspace && dir.starts_with(workspace) {
        if std::fs::remove_dir(&dir).is_err() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
}
