use std::collections::BTreeMap;
use std::path::Path;

use tributary_kernel::tracker::PathMapping;
use tributary_kernel::workflow::{ParsedTask, RepoGroup, Workflow, parse_task, substitute};

use crate::display;
use crate::ingest::{self, DeletionPrompt, RunSummary};
use crate::oracle::MergeOracle;

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowOptions {
    /// Operator override: every repo group syncs as if `force` were set.
    pub force: bool,
}

/// Task-subset seam for `choose-workflow`. The CLI supplies an interactive
/// picker; plain `ingest` runs everything.
pub trait TaskPicker {
    fn pick(&self, names: &[String]) -> Vec<usize>;
}

pub struct AllTasks;

impl TaskPicker for AllTasks {
    fn pick(&self, names: &[String]) -> Vec<usize> {
        (0..names.len()).collect()
    }
}

/// Read and classify a workflow file. Malformed JSON or an invalid sync task
/// is a configuration error; unknown task kinds survive classification and
/// are skipped at execution time.
pub fn load_workflow(path: &Path) -> Result<(Workflow, Vec<ParsedTask>), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read workflow {}: {err}", path.display()))?;
    let workflow = Workflow::from_json(&raw)
        .map_err(|err| format!("malformed workflow {}: {err}", path.display()))?;

    let mut tasks = Vec::new();
    for value in &workflow.tasks {
        tasks.push(parse_task(value).map_err(|err| format!("{}: {err}", path.display()))?);
    }
    if tasks.is_empty() {
        return Err(format!("workflow {} declares no tasks", path.display()).into());
    }
    Ok((workflow, tasks))
}

pub fn run_workflow(
    workspace: &Path,
    path: &Path,
    options: WorkflowOptions,
    oracle: &dyn MergeOracle,
    prompt: &dyn DeletionPrompt,
    picker: &dyn TaskPicker,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let (workflow, tasks) = load_workflow(path)?;
    if let Some(name) = &workflow.name {
        display::info(format!("running workflow {name}"));
    }

    let names: Vec<String> = tasks.iter().map(|task| task.name().to_string()).collect();
    let picked = picker.pick(&names);

    let mut summary = RunSummary::default();
    for (index, task) in tasks.iter().enumerate() {
        if !picked.contains(&index) {
            display::info(format!("skipping task {}", names[index]));
            continue;
        }
        match task {
            ParsedTask::Unknown { name, kind } => {
                display::warn(format!("task {name}: unsupported type {kind}, skipped"));
            }
            ParsedTask::Sync(spec) => {
                let groups: Vec<RepoGroup> = spec
                    .repos
                    .iter()
                    .map(|group| resolve_group(group, &workflow.variables, options.force))
                    .collect();
                summary.extend(ingest::ingest_repos(workspace, &groups, oracle, prompt)?);
            }
        }
    }
    Ok(summary)
}

/// Apply workflow variables to a repo group's string fields and fold in the
/// run-level force override.
fn resolve_group(
    group: &RepoGroup,
    vars: &BTreeMap<String, String>,
    force: bool,
) -> RepoGroup {
    let mut resolved = group.clone();
    resolved.repo = sub_field(&group.repo, vars);
    resolved.branch = sub_field(&group.branch, vars);
    resolved.fork_repo = group
        .fork_repo
        .as_deref()
        .map(|value| sub_field(value, vars));
    resolved.files = group
        .files
        .iter()
        .map(|mapping| PathMapping {
            source: sub_field(&mapping.source, vars),
            local: sub_field(&mapping.local, vars),
        })
        .collect();
    if force {
        resolved.force = true;
    }
    resolved
}

fn sub_field(input: &str, vars: &BTreeMap<String, String>) -> String {
    let result = substitute(input, vars);
    for name in &result.unknown {
        display::warn(format!("unknown workflow variable {{{{{name}}}}} left as-is"));
    }
    result.output
}
