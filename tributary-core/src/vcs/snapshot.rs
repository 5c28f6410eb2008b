use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{Direction, FetchOptions, Remote, RemoteCallbacks};
use tempfile::TempDir;

use super::credential_callback;

/// Resolve the operator's repo string to something git can dial. Plain
/// `owner/name` becomes a GitHub https URL; URLs, scp-style remotes, and
/// filesystem paths pass through verbatim.
pub fn repo_url(repo: &str) -> String {
    if repo.contains("://") || repo.starts_with("git@") || Path::new(repo).is_absolute() {
        return repo.to_string();
    }
    format!("https://github.com/{repo}.git")
}

/// Tip commit of `branch` on the remote, without cloning.
pub fn tip_commit(repo: &str, branch: &str) -> Result<String, git2::Error> {
    let url = repo_url(repo);
    let mut remote = Remote::create_detached(url.as_str())?;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(credential_callback);
    let connection = remote.connect_auth(Direction::Fetch, Some(callbacks), None)?;
    let wanted = format!("refs/heads/{branch}");
    let found = connection
        .list()?
        .iter()
        .find(|head| head.name() == wanted)
        .map(|head| head.oid().to_string());
    drop(connection);
    found.ok_or_else(|| git2::Error::from_str(&format!("branch {branch} not found on {repo}")))
}

/// A snapshot of one repo at one commit, staged into a disposable directory.
/// Dropping the snapshot removes the directory; that covers every exit path,
/// error paths included.
pub struct StagedSnapshot {
    root: PathBuf,
    commit: String,
    _temp: TempDir,
}

impl StagedSnapshot {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }
}

/// Materialize the current tip of `branch` into a staging directory with the
/// version-control metadata stripped, so `.git` internals can never leak into
/// file comparisons.
pub fn stage_snapshot(repo: &str, branch: &str) -> Result<StagedSnapshot, Box<dyn std::error::Error>> {
    let temp = tempfile::Builder::new()
        .prefix("tributary-stage-")
        .tempdir()?;
    let url = repo_url(repo);

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(credential_callback);
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    let commit = {
        let cloned = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch)
            .clone(&url, temp.path())
            .map_err(|err| format!("cannot stage {repo}@{branch}: {err}"))?;
        cloned.head()?.peel_to_commit()?.id().to_string()
    };

    let git_dir = temp.path().join(".git");
    if git_dir.exists() {
        std::fs::remove_dir_all(&git_dir)?;
    }

    Ok(StagedSnapshot {
        root: temp.path().to_path_buf(),
        commit,
        _temp: temp,
    })
}
