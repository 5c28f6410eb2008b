use std::path::{Path, PathBuf};

use tributary_kernel::tracker::TrackerRoot;

use crate::display;

/// Fixed tracker filename in the workspace root. The tracker is the engine's
/// only durable state.
pub const TRACKER_FILE: &str = "tributary-tracker.json";

pub fn tracker_path(dir: &Path) -> PathBuf {
    dir.join(TRACKER_FILE)
}

pub fn exists(dir: &Path) -> bool {
    tracker_path(dir).is_file()
}

/// Load the tracker. A missing file is a first run; a malformed file is
/// treated as empty with a warning rather than wedging every command.
pub fn read(dir: &Path) -> TrackerRoot {
    let path = tracker_path(dir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return TrackerRoot::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(root) => root,
        Err(err) => {
            display::warn(format!(
                "tracker at {} is malformed ({err}); starting from an empty ledger",
                path.display()
            ));
            TrackerRoot::default()
        }
    }
}

/// Persist the tracker atomically: serialize to a sibling temp file, then
/// rename over the target. Failure here is fatal to the current command.
pub fn write(dir: &Path, root: &TrackerRoot) -> Result<(), Box<dyn std::error::Error>> {
    let path = tracker_path(dir);
    let json = serde_json::to_string_pretty(root)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".tributary-tracker-")
        .tempfile_in(dir)
        .map_err(|err| format!("cannot stage tracker write in {}: {err}", dir.display()))?;
    std::io::Write::write_all(&mut temp, json.as_bytes())?;
    std::io::Write::write_all(&mut temp, b"\n")?;
    temp.persist(&path)
        .map_err(|err| format!("cannot write tracker {}: {err}", path.display()))?;
    Ok(())
}

pub fn last_commit(dir: &Path, repo: &str, branch: &str) -> Option<String> {
    read(dir).last_commit(repo, branch).map(str::to_string)
}

pub fn last_file_hash(dir: &Path, repo: &str, relative_local_path: &str) -> Option<String> {
    read(dir)
        .last_file_hash(repo, relative_local_path)
        .map(str::to_string)
}
