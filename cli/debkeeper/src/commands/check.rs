//! `debkeeper check`: show available updates.

use anyhow::Result;

use debkeeper_core::{CheckEntry, Orchestrator, VersionCheckResult};

pub fn run(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let entries = orchestrator.check()?;
    if entries.is_empty() {
        println!("No auto-updatable packages found");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    let available = entries
        .iter()
        .filter(|e| e.result.new_version().is_some())
        .count();
    println!();
    println!("{available} of {} package(s) can be updated", entries.len());
    Ok(())
}

fn format_entry(entry: &CheckEntry) -> String {
    match &entry.result {
        VersionCheckResult::UpToDate => format!("{} {}: up to date", entry.package, entry.current),
        VersionCheckResult::UpdateAvailable(v) => {
            format!("{} {} -> {v}", entry.package, entry.current)
        }
        VersionCheckResult::Indeterminate(reason) => {
            format!("{} {}: unknown ({reason})", entry.package, entry.current)
        }
    }
}
