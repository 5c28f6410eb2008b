use std::path::PathBuf;

use tributary_core::display;
use tributary_core::workflow::{self, AllTasks, WorkflowOptions};

use crate::actions::build_oracle;
use crate::cli::prompt::InteractiveDeletionPrompt;

pub(crate) fn run(workflow_file: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = std::env::current_dir()?;
    let path = PathBuf::from(workflow_file);
    let oracle = build_oracle(&path)?;

    let summary = workflow::run_workflow(
        &workspace,
        &path,
        WorkflowOptions { force },
        &oracle,
        &InteractiveDeletionPrompt,
        &AllTasks,
    )?;

    display::emit(format!("{summary}"));
    if summary.has_failures() {
        return Err("ingest completed with failures".into());
    }
    Ok(())
}
