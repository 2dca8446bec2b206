//! `debkeeper verify`: verify one manifest's artifact.

use std::path::Path;

use anyhow::{Context, Result};

use debkeeper_core::{ArtifactKey, Manifest, Orchestrator};

pub fn run(orchestrator: &Orchestrator<'_>, manifest_path: &Path, output: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;
    let report = orchestrator
        .verify_manifest(&manifest, output)
        .with_context(|| format!("could not verify {}", manifest.package.name))?;

    print!("{}", report.render());
    println!("Report written to {}", output.display());

    let artifact = ArtifactKey::for_package(&manifest.package).file_name(&manifest.package.version);
    report.check(&artifact)?;
    Ok(())
}
