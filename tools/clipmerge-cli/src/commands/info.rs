//! Show a saved merge plan.

use std::path::PathBuf;

use clipmerge_export::compositor::verify_coverage;
use clipmerge_media_model::MergePlan;

use super::plan::print_summary;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let plan = MergePlan::load(&path).map_err(|e| anyhow::anyhow!("Failed to load plan: {e}"))?;

    println!("Plan: {}", path.display());
    if let Err(e) = plan.validate() {
        println!("[FAIL] {e}");
        return Ok(());
    }
    print_summary(&plan);
    println!();
    println!("[OK] Structure is valid");
    match verify_coverage(&plan) {
        Ok(frames) => println!("[OK] Every one of {frames} frames shows exactly one clip"),
        Err(e) => println!("[FAIL] {e}"),
    }

    Ok(())
}
