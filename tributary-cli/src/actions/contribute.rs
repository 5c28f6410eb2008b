use tributary_core::contribute;
use tributary_core::forge::{Forge, GhForge};
use tributary_core::tracker;

pub(crate) fn run(dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = std::env::current_dir()?;

    if !tracker::exists(&workspace) {
        return Err(format!(
            "no {} found in {}; run an ingest workflow here first",
            tracker::TRACKER_FILE,
            workspace.display()
        )
        .into());
    }

    let forge = GhForge::new();
    forge.preflight()?;

    let summaries = contribute::contribute(&workspace, &forge, dry_run)?;
    if contribute::any_failures(&summaries) {
        return Err("contribute completed with failures".into());
    }
    Ok(())
}
