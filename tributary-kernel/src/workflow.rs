use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::tracker::PathMapping;

/// A workflow document as the operator wrote it. Tasks stay raw JSON here;
/// [`parse_task`] classifies them so unknown kinds can be skipped with a
/// warning instead of failing the whole file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

impl Workflow {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

/// One repo group inside a sync task.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoGroup {
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// false ⇒ always fetch, never short-circuit on a matching tip.
    #[serde(default = "default_true")]
    pub sync: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub fork_repo: Option<String>,
    pub files: Vec<PathMapping>,
    /// Per-task oracle overrides, highest precedence in the credential chain.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub repos: Vec<RepoGroup>,
}

/// Outcome of classifying one raw task entry.
#[derive(Clone, Debug)]
pub enum ParsedTask {
    Sync(SyncSpec),
    /// A task kind this engine does not execute; the runner warns and skips.
    Unknown { name: String, kind: String },
}

impl ParsedTask {
    pub fn name(&self) -> &str {
        match self {
            ParsedTask::Sync(spec) => spec.name.as_deref().unwrap_or("sync"),
            ParsedTask::Unknown { name, .. } => name,
        }
    }
}

pub fn parse_task(value: &Value) -> Result<ParsedTask, String> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "task entry is missing a string \"type\" field".to_string())?;

    match kind {
        "sync" => {
            let spec: SyncSpec = serde_json::from_value(value.clone())
                .map_err(|err| format!("invalid sync task: {err}"))?;
            if spec.repos.is_empty() {
                return Err("sync task declares no repos".to_string());
            }
            for group in &spec.repos {
                if group.repo.trim().is_empty() {
                    return Err("sync task has a repo group with an empty repo".to_string());
                }
                if group.files.is_empty() {
                    return Err(format!("repo group {} declares no file mappings", group.repo));
                }
            }
            Ok(ParsedTask::Sync(spec))
        }
        other => {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(other)
                .to_string();
            Ok(ParsedTask::Unknown {
                name,
                kind: other.to_string(),
            })
        }
    }
}

/// Result of one `{{var}}` substitution pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub output: String,
    /// Variable names that had no binding; their placeholders are left
    /// intact in `output` so misconfiguration stays visible.
    pub unknown: Vec<String>,
}

/// One-pass textual `{{var}}` replacement. No recursive expansion: a value
/// containing another placeholder is emitted verbatim.
pub fn substitute(input: &str, vars: &BTreeMap<String, String>) -> Substitution {
    let mut output = String::with_capacity(input.len());
    let mut unknown = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                match vars.get(key) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push_str(&rest[open..open + 2 + close + 2]);
                        if !unknown.contains(&key.to_string()) {
                            unknown.push(key.to_string());
                        }
                    }
                }
                rest = &after_open[close + 2..];
            }
            None => {
                // Unterminated placeholder: emit the tail as-is.
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    Substitution { output, unknown }
}
