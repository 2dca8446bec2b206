//! `debkeeper fetch`: download missing artifacts.

use anyhow::Result;

use debkeeper_core::Orchestrator;

pub fn run(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let summary = orchestrator.fetch_missing()?;

    for name in &summary.fetched {
        println!("Fetched {name}");
    }
    if !summary.present.is_empty() {
        println!("{} package(s) already present", summary.present.len());
    }
    for failure in &summary.failed {
        eprintln!("  {}: {}", failure.artifact, failure.reason);
    }

    if !summary.is_success() {
        anyhow::bail!("{} package(s) could not be fetched", summary.failed.len());
    }
    Ok(())
}
