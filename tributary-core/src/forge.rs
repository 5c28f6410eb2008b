use std::process::Command;

use serde_json::Value;

use tributary_kernel::tracker::PrStatus;

use crate::display;

/// A pull request as the forge currently sees it.
#[derive(Clone, Debug)]
pub struct PullRequestInfo {
    pub number: u64,
    pub branch: String,
    pub status: PrStatus,
    pub updated_at: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct CreatedPr {
    pub number: u64,
    pub url: String,
}

/// Forge operations the contribute executor needs. Kept narrow so tests can
/// substitute a recording fake; the production implementation shells out to
/// the GitHub CLI.
pub trait Forge {
    /// Fail fast with actionable text when the forge CLI is missing or
    /// unauthenticated.
    fn preflight(&self) -> Result<(), Box<dyn std::error::Error>>;

    fn pr_status(
        &self,
        source_repo: &str,
        number: u64,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>>;

    fn find_open_pr(
        &self,
        source_repo: &str,
        head: &str,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>>;

    fn open_pr(
        &self,
        source_repo: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPr, Box<dyn std::error::Error>>;
}

/// `gh`-backed forge client.
#[derive(Default)]
pub struct GhForge;

impl GhForge {
    pub fn new() -> Self {
        Self
    }
}

fn run_gh(args: &[&str]) -> Result<std::process::Output, Box<dyn std::error::Error>> {
    Command::new("gh")
        .args(args)
        .output()
        .map_err(|err| format!("failed to invoke gh: {err}").into())
}

fn parse_status(state: &str) -> PrStatus {
    match state.to_ascii_uppercase().as_str() {
        "OPEN" => PrStatus::Open,
        "MERGED" => PrStatus::Merged,
        _ => PrStatus::Closed,
    }
}

fn parse_pr_value(value: &Value) -> Option<PullRequestInfo> {
    Some(PullRequestInfo {
        number: value.get("number")?.as_u64()?,
        branch: value.get("headRefName")?.as_str()?.to_string(),
        status: parse_status(value.get("state")?.as_str()?),
        updated_at: value
            .get("updatedAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        url: value
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

const PR_JSON_FIELDS: &str = "number,headRefName,state,updatedAt,url";

impl Forge for GhForge {
    fn preflight(&self) -> Result<(), Box<dyn std::error::Error>> {
        let version = Command::new("gh").arg("--version").output();
        match version {
            Ok(output) if output.status.success() => {}
            _ => {
                return Err(
                    "GitHub CLI (gh) not found; install it from https://cli.github.com and re-run"
                        .into(),
                );
            }
        }

        let auth = run_gh(&["auth", "status"])?;
        if !auth.status.success() {
            return Err("GitHub CLI is not authenticated; run `gh auth login` first".into());
        }
        Ok(())
    }

    fn pr_status(
        &self,
        source_repo: &str,
        number: u64,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>> {
        let number_arg = number.to_string();
        let output = run_gh(&[
            "pr",
            "view",
            &number_arg,
            "--repo",
            source_repo,
            "--json",
            PR_JSON_FIELDS,
        ])?;
        if !output.status.success() {
            display::debug(format!(
                "gh pr view {number} on {source_repo} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parse_pr_value(&value))
    }

    fn find_open_pr(
        &self,
        source_repo: &str,
        head: &str,
    ) -> Result<Option<PullRequestInfo>, Box<dyn std::error::Error>> {
        let output = run_gh(&[
            "pr",
            "list",
            "--repo",
            source_repo,
            "--head",
            head,
            "--state",
            "open",
            "--limit",
            "1",
            "--json",
            PR_JSON_FIELDS,
        ])?;
        if !output.status.success() {
            return Err(format!(
                "gh pr list on {source_repo} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }
        let values: Vec<Value> = serde_json::from_slice(&output.stdout)?;
        Ok(values.first().and_then(parse_pr_value))
    }

    fn open_pr(
        &self,
        source_repo: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPr, Box<dyn std::error::Error>> {
        let output = run_gh(&[
            "pr", "create", "--repo", source_repo, "--head", head, "--title", title, "--body",
            body,
        ])?;
        if output.status.success() {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let number = url
                .rsplit('/')
                .next()
                .and_then(|tail| tail.parse::<u64>().ok())
                .ok_or_else(|| format!("gh pr create returned an unexpected url: {url}"))?;
            return Ok(CreatedPr { number, url });
        }

        // gh refuses to open a second PR for the same head; fall back to the
        // one that already exists rather than failing the repo.
        if let Some(existing) = self.find_open_pr(source_repo, head)? {
            display::info(format!(
                "reusing existing pull request #{} for {head}",
                existing.number
            ));
            return Ok(CreatedPr {
                number: existing.number,
                url: existing.url,
            });
        }

        Err(format!(
            "gh pr create on {source_repo} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )
        .into())
    }
}

/// Head ref for a PR: plain branch when contributing from the source repo
/// itself, `owner:branch` when contributing from an `owner/name` fork. Fork
/// identifiers that are URLs or paths have no owner to name, so the bare
/// branch is used.
pub fn head_ref(source_repo: &str, fork_repo: &str, branch: &str) -> String {
    if source_repo == fork_repo {
        return branch.to_string();
    }
    match fork_repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') && !fork_repo.contains("://") =>
        {
            format!("{owner}:{branch}")
        }
        _ => branch.to_string(),
    }
}
