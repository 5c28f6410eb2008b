mod fork;
mod snapshot;

pub use fork::{
    ForkClone, clone_fork, commit_all_in, default_branch_in, ensure_branch_in, push_branch_in,
    sync_fork_with_source_in,
};
pub use snapshot::{StagedSnapshot, repo_url, stage_snapshot, tip_commit};

use git2::{Cred, CredentialType};
use std::path::Path;

/// Credential chain for remote operations: git's credential helper, then a
/// GITHUB_TOKEN, then on-disk ssh keys, then libgit2's default. Local-path
/// remotes never reach this callback.
pub(crate) fn credential_callback(
    url: &str,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        if let Ok(config) = git2::Config::open_default()
            && let Ok(cred) = Cred::credential_helper(&config, url, username_from_url)
        {
            return Ok(cred);
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let user = username_from_url.unwrap_or("git");
            return Cred::userpass_plaintext(user, &token);
        }
    }

    if allowed.contains(CredentialType::SSH_KEY)
        && let Some(user) = username_from_url
        && let Ok(home) = std::env::var("HOME")
    {
        for key_name in ["id_ed25519", "id_rsa"] {
            let private = Path::new(&home).join(".ssh").join(key_name);
            if private.exists() {
                let public = private.with_extension("pub");
                let public = public.exists().then_some(public);
                return Cred::ssh_key(user, public.as_deref(), &private, None);
            }
        }
    }

    Cred::default()
}
