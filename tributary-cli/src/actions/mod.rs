pub(crate) mod choose;
pub(crate) mod contribute;
pub(crate) mod ingest;

use std::path::Path;

use tributary_core::oracle::LazyOpenRouterOracle;
use tributary_core::workflow;
use tributary_kernel::workflow::ParsedTask;

/// Build the run's merge oracle from the workflow's own overrides (first sync
/// group that declares one wins), falling back to environment and config-file
/// settings. Credentials resolve lazily on the first merge.
pub(crate) fn build_oracle(
    workflow_path: &Path,
) -> Result<LazyOpenRouterOracle, Box<dyn std::error::Error>> {
    let (_, tasks) = workflow::load_workflow(workflow_path)?;
    let mut model = None;
    let mut api_key_env = None;
    for task in tasks {
        if let ParsedTask::Sync(spec) = task {
            for group in spec.repos {
                if model.is_none() {
                    model = group.model;
                }
                if api_key_env.is_none() {
                    api_key_env = group.api_key_env;
                }
            }
        }
    }
    Ok(LazyOpenRouterOracle::new(model, api_key_env))
}
