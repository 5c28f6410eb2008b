use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::tracker::TRACKER_FILE;

/// Sidecar suffix for pre-merge backups. Never synced in either direction.
pub const MERGE_BACKUP_SUFFIX: &str = ".tributary-backup";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Copy,
    Delete,
}

/// One unit of work for an executor: a single file, addressed absolutely for
/// I/O and relatively (source side against the staging/fork root, local side
/// against the workspace root) for tracking and display.
#[derive(Clone, Debug)]
pub struct SyncOperation {
    pub absolute_local_path: PathBuf,
    pub absolute_source_path: PathBuf,
    pub relative_local_path: String,
    pub relative_source_path: String,
    pub repo: String,
    pub op: OpKind,
}

/// Recursively enumerate regular files under `root` in a stable order.
/// `.git` trees are never traversed; symlinks and other non-regular entries
/// are skipped, as are the engine's own artifacts (tracker, merge backups).
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a: &OsStr, b: &OsStr| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != OsStr::new(".git"))
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| !is_engine_artifact(path))
        .collect()
}

fn is_engine_artifact(path: &Path) -> bool {
    match path.file_name().and_then(OsStr::to_str) {
        Some(name) => name == TRACKER_FILE || name.ends_with(MERGE_BACKUP_SUFFIX),
        None => false,
    }
}

/// Slash-separated path of `path` relative to `base`.
pub fn rel_string(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk a staged source subtree and emit one copy-intent operation per file,
/// creating missing local directories along the way.
pub fn collect_source_ops(
    source_root: &Path,
    local_root: &Path,
    stage_anchor: &Path,
    workspace_root: &Path,
    repo: &str,
) -> std::io::Result<Vec<SyncOperation>> {
    let mut ops = Vec::new();
    for source_path in walk_files(source_root) {
        let Ok(rel) = source_path.strip_prefix(source_root) else {
            continue;
        };
        let local_path = local_root.join(rel);
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        ops.push(SyncOperation {
            relative_source_path: rel_string(&source_path, stage_anchor),
            relative_local_path: rel_string(&local_path, workspace_root),
            absolute_source_path: source_path,
            absolute_local_path: local_path,
            repo: repo.to_string(),
            op: OpKind::Copy,
        });
    }
    Ok(ops)
}
