//! `debkeeper update`: resolve, fetch, and verify every auto-updatable package.

use anyhow::Result;

use debkeeper_core::{MirrorConfig, Orchestrator};

pub fn run(orchestrator: &Orchestrator<'_>, config: &MirrorConfig) -> Result<()> {
    let report = orchestrator.run_update()?;

    println!(
        "{} need update, {} updated, {} not updated",
        report.needs_update().len(),
        report.updated().len(),
        report.not_updated().len()
    );
    for artifact in report.updated() {
        println!("  updated {artifact}");
    }
    println!(
        "Run log written to {}",
        config.paths.reports.join(debkeeper_core::report::RUN_LOG_FILE).display()
    );

    if config.update.archive_reports {
        super::archive::run(&config.paths.reports)?;
    }
    Ok(())
}
