//! Batch orchestration.
//!
//! Each manifest goes through load, resolve, fetch, verify on its own. Every
//! failure is caught at the manifest boundary and becomes a run-report line;
//! nothing aborts the batch.
//!
//! With `jobs > 1` manifests run on a rayon pool. Fetches still serialize per
//! (name, arch) inside the shared [`Fetcher`], and the per-manifest reports
//! are stitched together in manifest order, so the run log does not depend on
//! scheduling.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::artifact::ArtifactKey;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::fetcher::{has_artifact, FetchMode, Fetcher};
use crate::http::HttpTransport;
use crate::manifest::Manifest;
use crate::report::{FetchSummary, RunReport, Skipped, RUN_LOG_FILE};
use crate::resolver::{Resolver, VersionCheckResult};
use crate::store::{report_file_name, write_atomic, ArtifactStore, ManifestStore};
use crate::tools::ToolRunner;
use crate::verifier::{SignatureCheck, VerificationReport, Verifier};

/// Reason recorded for packages already at the latest version.
pub const NO_UPDATE_AVAILABLE: &str = "no update available";

/// Result of `check` for one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntry {
    /// Manifest id.
    pub id: String,
    pub package: String,
    pub current: String,
    pub result: VersionCheckResult,
}

/// Drives the pipeline over a set of manifests.
pub struct Orchestrator<'a> {
    config: &'a MirrorConfig,
    manifests: &'a dyn ManifestStore,
    artifacts: &'a dyn ArtifactStore,
    transport: &'a dyn HttpTransport,
    tools: &'a dyn ToolRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a MirrorConfig,
        manifests: &'a dyn ManifestStore,
        artifacts: &'a dyn ArtifactStore,
        transport: &'a dyn HttpTransport,
        tools: &'a dyn ToolRunner,
    ) -> Self {
        Orchestrator {
            config,
            manifests,
            artifacts,
            transport,
            tools,
        }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.transport, &self.config.http.release_api)
    }

    fn verifier(&self) -> Verifier<'_> {
        Verifier::new(self.tools, &self.config.tools)
    }

    /// Update every manifest in the store and write the run log.
    pub fn run_update(&self) -> Result<RunReport> {
        let ids = self.manifests.list_manifests()?;
        log::info!("updating {} manifest(s)", ids.len());
        let report = self.run_update_batch(&ids);
        self.write_run_log(&report)?;
        Ok(report)
    }

    /// Update the given manifests. Never fails; every problem ends up in the
    /// returned report.
    pub fn run_update_batch(&self, ids: &[String]) -> RunReport {
        let fetcher = Fetcher::new(self.transport, self.artifacts);
        let jobs = self.config.update.jobs;

        let parts: Vec<RunReport> = if jobs > 1 && ids.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| {
                    ids.par_iter()
                        .map(|id| self.update_one(id, &fetcher))
                        .collect()
                }),
                Err(e) => {
                    log::warn!("could not start {jobs} worker threads ({e}); running sequentially");
                    ids.iter().map(|id| self.update_one(id, &fetcher)).collect()
                }
            }
        } else {
            ids.iter().map(|id| self.update_one(id, &fetcher)).collect()
        };

        let mut report = RunReport::new();
        for part in parts {
            report.extend(part);
        }
        log::info!(
            "{} need update, {} updated, {} not updated",
            report.needs_update().len(),
            report.updated().len(),
            report.not_updated().len()
        );
        report
    }

    /// Write `update_log.txt` into the reports directory.
    pub fn write_run_log(&self, report: &RunReport) -> Result<PathBuf> {
        let dir = &self.config.paths.reports;
        std::fs::create_dir_all(dir).map_err(|e| MirrorError::store(dir, e))?;
        let path = dir.join(RUN_LOG_FILE);
        write_atomic(&path, report.render().as_bytes())?;
        Ok(path)
    }

    fn update_one(&self, id: &str, fetcher: &Fetcher<'_>) -> RunReport {
        let mut report = RunReport::new();

        let text = match self.manifests.read_manifest(id) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("skipping {id}: {e}");
                return report;
            }
        };
        let mut manifest = match Manifest::parse(&text) {
            Ok(m) => m,
            Err(e) => {
                if Manifest::peek_auto_update(&text) == Some(false) {
                    log::debug!("{id}: auto_update disabled, ignoring invalid manifest: {e}");
                    return report;
                }
                match Manifest::peek_name(&text) {
                    Some(name) => {
                        log::warn!("{id}: {e}");
                        report.mark_not_updated(&name, e);
                    }
                    None => log::warn!("skipping {id}: {e}"),
                }
                return report;
            }
        };
        if !manifest.package.auto_update {
            log::debug!("{id}: auto_update disabled");
            return report;
        }

        let key = ArtifactKey::for_package(&manifest.package);
        let current = key.file_name(&manifest.package.version);

        let new_version = match self.resolver().resolve(&manifest.package) {
            VersionCheckResult::UpdateAvailable(v) => v,
            VersionCheckResult::UpToDate => {
                report.mark_not_updated(&current, NO_UPDATE_AVAILABLE);
                return report;
            }
            VersionCheckResult::Indeterminate(reason) => {
                report.mark_not_updated(&current, reason);
                return report;
            }
        };
        report.need_update(&current, &manifest.package.source, &new_version);
        let target = key.file_name(&new_version);

        if let Err(e) = self.apply_update(id, &mut manifest, &new_version, fetcher) {
            log::warn!("{id}: update to {new_version} failed: {e}");
            report.mark_not_updated(&target, e);
            return report;
        }
        report.mark_updated(&target);
        report
    }

    fn apply_update(
        &self,
        id: &str,
        manifest: &mut Manifest,
        new_version: &str,
        fetcher: &Fetcher<'_>,
    ) -> Result<()> {
        if !self.config.update.defer_version_commit {
            manifest.package.version = new_version.to_string();
            self.manifests.save_manifest(id, manifest)?;
        }

        let artifact = fetcher.fetch(&manifest.package, new_version, FetchMode::Updating)?;

        manifest.package.version = new_version.to_string();
        manifest.package.signature = Some(artifact.signature.clone());
        self.manifests.save_manifest(id, manifest)?;

        let output = self.config.paths.reports.join(report_file_name(id));
        let verification = self
            .verifier()
            .verify(&artifact.path, &SignatureCheck::Skip, &output)?;
        verification.check(&artifact.file_name)
    }

    /// Resolve every auto-updatable manifest without changing anything.
    pub fn check(&self) -> Result<Vec<CheckEntry>> {
        let resolver = self.resolver();
        let mut entries = Vec::new();
        for id in self.manifests.list_manifests()? {
            let manifest = match self.manifests.load_manifest(&id) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("skipping {id}: {e}");
                    continue;
                }
            };
            if !manifest.package.auto_update {
                continue;
            }
            let result = resolver.resolve(&manifest.package);
            entries.push(CheckEntry {
                id,
                package: manifest.package.name,
                current: manifest.package.version,
                result,
            });
        }
        Ok(entries)
    }

    /// Fetch an artifact for every manifest that has none, at the manifest's
    /// version. Missing signatures are filled in.
    pub fn fetch_missing(&self) -> Result<FetchSummary> {
        let fetcher = Fetcher::new(self.transport, self.artifacts);
        let mut summary = FetchSummary::default();

        for id in self.manifests.list_manifests()? {
            let text = match self.manifests.read_manifest(&id) {
                Ok(text) => text,
                Err(e) => {
                    summary.failed.push(Skipped {
                        artifact: id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let mut manifest = match Manifest::parse(&text) {
                Ok(m) => m,
                Err(e) => {
                    let label = Manifest::peek_name(&text).unwrap_or_else(|| id.clone());
                    summary.failed.push(Skipped {
                        artifact: label,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let package = &manifest.package;
            let file_name = ArtifactKey::for_package(package).file_name(&package.version);

            match has_artifact(self.artifacts, package) {
                Ok(true) => {
                    log::debug!("{id}: artifact present");
                    summary.present.push(package.name.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    summary.failed.push(Skipped {
                        artifact: file_name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            let result = fetcher
                .fetch(package, &package.version, FetchMode::Plain)
                .and_then(|artifact| {
                    if manifest.package.signature.is_none() {
                        manifest.package.signature = Some(artifact.signature.clone());
                        self.manifests.save_manifest(&id, &manifest)?;
                    }
                    Ok(artifact)
                });
            match result {
                Ok(artifact) => summary.fetched.push(artifact.file_name),
                Err(e) => {
                    log::warn!("{id}: {e}");
                    summary.failed.push(Skipped {
                        artifact: file_name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Verify the artifact for `manifest`, fetching it first if the store
    /// does not hold it at the manifest's version.
    pub fn verify_manifest(&self, manifest: &Manifest, output: &Path) -> Result<VerificationReport> {
        let package = &manifest.package;
        let file_name = ArtifactKey::for_package(package).file_name(&package.version);

        let path = if self.artifacts.list_artifacts()?.contains(&file_name) {
            self.artifacts.artifact_path(&file_name)
        } else {
            Fetcher::new(self.transport, self.artifacts)
                .fetch(package, &package.version, FetchMode::Verifying)?
                .path
        };

        let expected = match &package.signature {
            Some(sig) => SignatureCheck::Expect(sig.clone()),
            None => SignatureCheck::Unrecorded,
        };
        self.verifier().verify(&path, &expected, output)
    }
}
