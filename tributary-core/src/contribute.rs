use std::fmt;
use std::path::Path;

use tributary_kernel::tracker::{PrStatus, PullRequestRecord, RepoRecord};

use crate::display;
use crate::forge::{Forge, PullRequestInfo, head_ref};
use crate::tracker;
use crate::vcs;
use crate::walker::{self, OpKind, SyncOperation};

#[derive(Clone, Debug, Default)]
pub struct ContributeSummary {
    pub repo: String,
    pub copied: usize,
    pub deleted: usize,
    pub pr_url: Option<String>,
    pub skipped: Option<String>,
    pub error: Option<String>,
}

impl ContributeSummary {
    fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for ContributeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "{}: failed ({error})", self.repo);
        }
        if let Some(reason) = &self.skipped {
            return write!(f, "{}: skipped ({reason})", self.repo);
        }
        match &self.pr_url {
            Some(url) => write!(
                f,
                "{}: {} copied, {} deleted, pull request {url}",
                self.repo, self.copied, self.deleted
            ),
            None => write!(
                f,
                "{}: {} copied, {} deleted",
                self.repo, self.copied, self.deleted
            ),
        }
    }
}

pub fn any_failures(summaries: &[ContributeSummary]) -> bool {
    summaries.iter().any(|summary| summary.error.is_some())
}

/// Drive the contribute phase over every repo the tracker knows. Repos
/// without a declared fork are skipped; repo-scoped failures are logged and
/// the run continues. The tracker is re-persisted after each repo that
/// produced or refreshed a PR record.
pub fn contribute(
    workspace: &Path,
    forge: &dyn Forge,
    dry_run: bool,
) -> Result<Vec<ContributeSummary>, Box<dyn std::error::Error>> {
    let mut root = tracker::read(workspace);
    if root.is_empty() {
        return Err("tracker has no repos; run an ingest workflow first".into());
    }

    let repo_names: Vec<String> = root.repos.keys().cloned().collect();
    let mut summaries = Vec::new();

    for repo_name in repo_names {
        let record = root
            .repo(&repo_name)
            .cloned()
            .expect("repo listed from the tracker");
        let Some(fork) = record.fork_repo.clone() else {
            display::info(format!("{repo_name}: no fork declared, skipping"));
            let mut summary = ContributeSummary::new(&repo_name);
            summary.skipped = Some("no fork declared".to_string());
            summaries.push(summary);
            continue;
        };

        match contribute_one(workspace, &repo_name, &record, &fork, forge, dry_run) {
            Ok((summary, pr_record)) => {
                if let Some(pr) = pr_record
                    && let Some(live) = root.repo_mut(&repo_name)
                {
                    live.pull_request = Some(pr);
                    tracker::write(workspace, &root)?;
                }
                display::emit(format!("{summary}"));
                summaries.push(summary);
            }
            Err(err) => {
                display::error(format!("{repo_name}: {err}"));
                let mut summary = ContributeSummary::new(&repo_name);
                summary.error = Some(err.to_string());
                summaries.push(summary);
            }
        }
    }

    Ok(summaries)
}

fn contribute_one(
    workspace: &Path,
    repo_name: &str,
    record: &RepoRecord,
    fork: &str,
    forge: &dyn Forge,
    dry_run: bool,
) -> Result<(ContributeSummary, Option<PullRequestRecord>), Box<dyn std::error::Error>> {
    let mut summary = ContributeSummary::new(repo_name);

    // Refresh the recorded PR against the forge. The recorded branch name is
    // authoritative while the PR stays open; anything else means a fresh
    // branch and a fresh PR.
    let mut open_pr: Option<PullRequestInfo> = None;
    if let Some(pr) = &record.pull_request {
        match forge.pr_status(repo_name, pr.pr_number)? {
            Some(info) if info.status.is_open() => open_pr = Some(info),
            Some(info) => display::info(format!(
                "{repo_name}: recorded PR #{} is {:?}; a new one will be opened",
                pr.pr_number, info.status
            )),
            None => display::warn(format!(
                "{repo_name}: recorded PR #{} is gone from the forge",
                pr.pr_number
            )),
        }
    }
    let updating = open_pr.is_some();
    let branch = match (&open_pr, &record.pull_request) {
        (Some(_), Some(pr)) => pr.branch_name.clone(),
        _ => format!(
            "contribute-{}",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ),
    };

    let clone = vcs::clone_fork(fork)?;

    if dry_run {
        // Every mutating step below is a logged no-op in dry-run.
        display::emit(format!("would sync fork {fork} with {repo_name}"));
        match &record.pull_request {
            Some(pr) if updating => display::emit(format!(
                "would reuse branch {branch} for open PR #{}",
                pr.pr_number
            )),
            _ => display::emit(format!("would create branch {branch} from the fork default")),
        }
    } else {
        if let Err(err) = vcs::sync_fork_with_source_in(clone.root(), repo_name) {
            display::warn(format!(
                "{repo_name}: could not sync fork with source: {err}"
            ));
        }
        vcs::ensure_branch_in(clone.root(), &branch, updating)?;
    }

    let ops = collect_contribute_ops(workspace, repo_name, record, clone.root());
    if ops.is_empty() {
        summary.skipped = Some("no tracked mappings produced work".to_string());
        return Ok((summary, None));
    }

    for op in &ops {
        match op.op {
            OpKind::Copy => {
                if dry_run {
                    display::emit(format!(
                        "copy {} -> {}",
                        op.relative_local_path, op.relative_source_path
                    ));
                    summary.copied += 1;
                    continue;
                }
                if let Some(parent) = op.absolute_source_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&op.absolute_local_path, &op.absolute_source_path)?;
                summary.copied += 1;
            }
            OpKind::Delete => {
                if dry_run {
                    display::emit(format!("delete {}", op.relative_source_path));
                    summary.deleted += 1;
                    continue;
                }
                match std::fs::remove_file(&op.absolute_source_path) {
                    Ok(()) => summary.deleted += 1,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    if dry_run {
        display::emit(format!(
            "would commit \"{}\"",
            crate::CONTRIBUTE_COMMIT_MESSAGE
        ));
        display::emit(format!("would push {branch} (force={updating})"));
        match &open_pr {
            Some(info) => display::emit(format!(
                "would update PR #{} on {repo_name}",
                info.number
            )),
            None => display::emit(format!(
                "would open a PR on {repo_name} from {}",
                head_ref(repo_name, fork, &branch)
            )),
        }
        summary.skipped = Some("dry-run".to_string());
        return Ok((summary, None));
    }

    let committed = vcs::commit_all_in(clone.root(), crate::CONTRIBUTE_COMMIT_MESSAGE)?;
    if !committed {
        display::info(format!("{repo_name}: fork already matches the workspace"));
        summary.skipped = Some("no changes".to_string());
        return Ok((summary, None));
    }

    if updating {
        vcs::push_branch_in(clone.root(), &branch, true)?;
    } else if let Err(err) = vcs::push_branch_in(clone.root(), &branch, false) {
        display::warn(format!(
            "{repo_name}: push failed ({err}); retrying as force push"
        ));
        vcs::push_branch_in(clone.root(), &branch, true)?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let (number, url) = match open_pr {
        Some(info) => (info.number, info.url),
        None => {
            let head = head_ref(repo_name, fork, &branch);
            let title = format!("Contribute changes to {repo_name}");
            let body = pr_body(repo_name, &summary, &ops);
            let created = forge.open_pr(repo_name, &head, &title, &body)?;
            (created.number, created.url)
        }
    };

    if !url.is_empty() {
        display::emit(format!("{repo_name}: pull request {url}"));
        summary.pr_url = Some(url);
    }

    let pr_record = PullRequestRecord {
        pr_number: number,
        branch_name: branch,
        status: PrStatus::Open,
        last_updated: now,
    };
    Ok((summary, Some(pr_record)))
}

/// C9: invert the ingest walk. Every local file under a mapping becomes a
/// copy into the fork's version of the source path; tracked files that exist
/// in the fork but vanished locally become deletes. Untracked fork files are
/// never touched.
fn collect_contribute_ops(
    workspace: &Path,
    repo_name: &str,
    record: &RepoRecord,
    fork_root: &Path,
) -> Vec<SyncOperation> {
    let mut ops = Vec::new();

    for mapping in &record.file_paths {
        let local_root = workspace.join(mapping.local_rel());
        let fork_target = fork_root.join(mapping.source_rel());

        if local_root.is_dir() {
            for local_path in walker::walk_files(&local_root) {
                let Ok(rel) = local_path.strip_prefix(&local_root) else {
                    continue;
                };
                let destination = fork_target.join(rel);
                ops.push(SyncOperation {
                    relative_local_path: walker::rel_string(&local_path, workspace),
                    relative_source_path: walker::rel_string(&destination, fork_root),
                    absolute_local_path: local_path,
                    absolute_source_path: destination,
                    repo: repo_name.to_string(),
                    op: OpKind::Copy,
                });
            }

            if fork_target.is_dir() {
                for fork_path in walker::walk_files(&fork_target) {
                    let Ok(rel) = fork_path.strip_prefix(&fork_target) else {
                        continue;
                    };
                    let local_equivalent = local_root.join(rel);
                    let rel_local = walker::rel_string(&local_equivalent, workspace);
                    if !local_equivalent.exists() && record.files.contains_key(&rel_local) {
                        ops.push(SyncOperation {
                            relative_local_path: rel_local,
                            relative_source_path: walker::rel_string(&fork_path, fork_root),
                            absolute_local_path: local_equivalent,
                            absolute_source_path: fork_path,
                            repo: repo_name.to_string(),
                            op: OpKind::Delete,
                        });
                    }
                }
            }
        } else if local_root.is_file() {
            ops.push(SyncOperation {
                relative_local_path: walker::rel_string(&local_root, workspace),
                relative_source_path: walker::rel_string(&fork_target, fork_root),
                absolute_local_path: local_root,
                absolute_source_path: fork_target,
                repo: repo_name.to_string(),
                op: OpKind::Copy,
            });
        } else {
            // Local side of a single-file mapping is gone; delete from the
            // fork only when the tracker managed it.
            let rel_local = walker::rel_string(&local_root, workspace);
            if fork_target.is_file() && record.files.contains_key(&rel_local) {
                ops.push(SyncOperation {
                    relative_local_path: rel_local,
                    relative_source_path: walker::rel_string(&fork_target, fork_root),
                    absolute_local_path: local_root,
                    absolute_source_path: fork_target,
                    repo: repo_name.to_string(),
                    op: OpKind::Delete,
                });
            }
        }
    }

    ops
}

fn pr_body(repo_name: &str, summary: &ContributeSummary, ops: &[SyncOperation]) -> String {
    let mut body = format!(
        "## {repo_name}\n\nLocal workspace changes contributed back upstream: {} copied, {} deleted.\n\n",
        summary.copied, summary.deleted
    );
    for op in ops {
        match op.op {
            OpKind::Copy => {
                body.push_str(&format!(
                    "- copy `{}` -> `{}`\n",
                    op.relative_local_path, op.relative_source_path
                ));
            }
            OpKind::Delete => {
                body.push_str(&format!("- delete `{}`\n", op.relative_source_path));
            }
        }
    }
    body
}
