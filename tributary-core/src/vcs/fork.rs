use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Commit, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository,
    Signature,
};
use tempfile::TempDir;

use super::{credential_callback, snapshot::repo_url};

/// A working clone of a fork, `.git` intact, in a disposable directory.
pub struct ForkClone {
    root: PathBuf,
    _temp: TempDir,
}

impl ForkClone {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn clone_fork(fork_repo: &str) -> Result<ForkClone, Box<dyn std::error::Error>> {
    let temp = tempfile::Builder::new()
        .prefix("tributary-fork-")
        .tempdir()?;
    let url = repo_url(fork_repo);

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(credential_callback);
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    RepoBuilder::new()
        .fetch_options(fetch)
        .clone(&url, temp.path())
        .map_err(|err| format!("cannot clone fork {fork_repo}: {err}"))?;

    Ok(ForkClone {
        root: temp.path().to_path_buf(),
        _temp: temp,
    })
}

fn signature(repo: &Repository) -> Result<Signature<'static>, git2::Error> {
    repo.signature()
        .or_else(|_| Signature::now("Tributary", "tributary@local"))
}

fn default_branch_impl(repo: &Repository) -> Result<String, git2::Error> {
    if let Ok(reference) = repo.find_reference("refs/remotes/origin/HEAD")
        && let Some(symbolic) = reference.symbolic_target()
        && let Some(name) = symbolic.strip_prefix("refs/remotes/origin/")
    {
        return Ok(name.to_string());
    }

    for candidate in ["main", "master"] {
        if repo.find_branch(candidate, BranchType::Local).is_ok() {
            return Ok(candidate.to_string());
        }
    }

    repo.head()?
        .shorthand()
        .map(str::to_string)
        .ok_or_else(|| git2::Error::from_str("cannot determine the clone's default branch"))
}

pub fn default_branch_in<P: AsRef<Path>>(repo_path: P) -> Result<String, git2::Error> {
    let repo = Repository::open(repo_path)?;
    default_branch_impl(&repo)
}

fn checkout_branch_impl(repo: &Repository, name: &str) -> Result<(), git2::Error> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.set_head(&format!("refs/heads/{name}"))?;
    repo.checkout_head(Some(&mut checkout))
}

fn resolve_branch_commit<'repo>(
    repo: &'repo Repository,
    name: &str,
) -> Result<Commit<'repo>, git2::Error> {
    if let Ok(branch) = repo.find_branch(name, BranchType::Local) {
        return branch.into_reference().peel_to_commit();
    }
    if let Ok(branch) = repo.find_branch(name, BranchType::Remote) {
        return branch.into_reference().peel_to_commit();
    }
    repo.revparse_single(name)?.peel_to_commit()
}

/// Merge `other` (a local or remote-tracking branch name) into HEAD:
/// fast-forward when possible, otherwise a two-parent merge commit.
/// Conflicts abort with the conflicting branch named.
fn merge_branch_impl(repo: &Repository, other: &str) -> Result<(), Box<dyn std::error::Error>> {
    let other_commit = resolve_branch_commit(repo, other)?;
    let head_commit = repo.head()?.peel_to_commit()?;

    if head_commit.id() == other_commit.id()
        || repo.graph_descendant_of(head_commit.id(), other_commit.id())?
    {
        return Ok(());
    }

    if repo.graph_descendant_of(other_commit.id(), head_commit.id())? {
        let head_ref_name = repo
            .head()?
            .name()
            .map(str::to_string)
            .ok_or_else(|| git2::Error::from_str("HEAD is not a named reference"))?;
        let mut reference = repo.find_reference(&head_ref_name)?;
        reference.set_target(other_commit.id(), &format!("fast-forward to {other}"))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout))?;
        return Ok(());
    }

    let mut index = repo.merge_commits(&head_commit, &other_commit, None)?;
    if index.has_conflicts() {
        return Err(format!("merging {other} produced conflicts; resolve in the fork first").into());
    }
    let tree_oid = index.write_tree_to(repo)?;
    let tree = repo.find_tree(tree_oid)?;
    let signature = signature(repo)?;
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &format!("Merge {other}"),
        &tree,
        &[&head_commit, &other_commit],
    )?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))?;
    Ok(())
}

/// Bring the fork's default branch up to date with the source repository:
/// fetch the source as an auxiliary remote, merge its default line, push the
/// refreshed default back to the fork.
pub fn sync_fork_with_source_in<P: AsRef<Path>>(
    repo_path: P,
    source_repo: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::open(repo_path.as_ref())?;
    let url = repo_url(source_repo);

    {
        let mut remote = match repo.find_remote("source") {
            Ok(remote) => remote,
            Err(_) => repo.remote("source", &url)?,
        };
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(credential_callback);
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        remote.fetch(&[] as &[&str], Some(&mut fetch), None)?;
    }

    let default = default_branch_impl(&repo)?;
    checkout_branch_impl(&repo, &default)?;
    merge_branch_impl(&repo, &format!("source/{default}"))?;
    push_impl(&repo, &default, false)?;
    Ok(())
}

/// Check out the working branch for this contribute run. When updating an
/// existing PR the recorded branch is reused verbatim (local first, then the
/// fork's remote copy) and the default line is merged in; otherwise a fresh
/// branch is cut from the default.
pub fn ensure_branch_in<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    reuse_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::open(repo_path.as_ref())?;
    let default = default_branch_impl(&repo)?;

    if reuse_existing {
        if repo.find_branch(branch, BranchType::Local).is_err() {
            let remote_name = format!("origin/{branch}");
            match repo.find_branch(&remote_name, BranchType::Remote) {
                Ok(remote_branch) => {
                    let commit = remote_branch.into_reference().peel_to_commit()?;
                    repo.branch(branch, &commit, false)?;
                }
                Err(_) => {
                    let base = resolve_branch_commit(&repo, &default)?;
                    repo.branch(branch, &base, false)?;
                }
            }
        }
        checkout_branch_impl(&repo, branch)?;
        merge_branch_impl(&repo, &default)?;
        return Ok(());
    }

    let base = resolve_branch_commit(&repo, &default)?;
    repo.branch(branch, &base, true)?;
    checkout_branch_impl(&repo, branch)?;
    Ok(())
}

/// Stage everything, deletions included, and commit. A clean tree is not an
/// error: the caller learns nothing changed and skips push/PR.
pub fn commit_all_in<P: AsRef<Path>>(repo_path: P, message: &str) -> Result<bool, git2::Error> {
    let repo = Repository::open(repo_path)?;
    let mut index = repo.index()?;
    index.add_all(["."], IndexAddOption::DEFAULT, None)?;
    index.update_all(["."], None)?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let parent_commit = repo.head().ok().and_then(|head| head.peel_to_commit().ok());

    match parent_commit.as_ref() {
        Some(parent) if parent.tree_id() == tree_id => return Ok(false),
        None if index.is_empty() => return Ok(false),
        _ => {}
    }

    let signature = signature(&repo)?;
    let parents: Vec<&Commit> = parent_commit.as_ref().map(|p| vec![p]).unwrap_or_default();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;
    Ok(true)
}

fn push_impl(repo: &Repository, branch: &str, force: bool) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote("origin")?;
    let refspec = format!(
        "{}refs/heads/{branch}:refs/heads/{branch}",
        if force { "+" } else { "" }
    );
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(credential_callback);
    let mut options = PushOptions::new();
    options.remote_callbacks(callbacks);
    remote.push(&[refspec.as_str()], Some(&mut options))
}

pub fn push_branch_in<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    force: bool,
) -> Result<(), git2::Error> {
    let repo = Repository::open(repo_path)?;
    push_impl(&repo, branch, force)
}
