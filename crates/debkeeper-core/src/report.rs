//! Run reports.
//!
//! A [`RunReport`] collects the outcome of one batch in three buckets. Entries
//! are only ever appended; the report is rendered once at the end of the run
//! and written to `update_log.txt`.

use std::fmt;

/// File name of the run log inside the reports directory.
pub const RUN_LOG_FILE: &str = "update_log.txt";

/// A package with a newer upstream version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Artifact name at the current version.
    pub artifact: String,
    /// The manifest's source template.
    pub source: String,
    /// Version the package is moving to.
    pub new_version: String,
}

/// A package that was not updated, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub artifact: String,
    pub reason: String,
}

/// Aggregate outcome of one orchestration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    needs_update: Vec<PendingUpdate>,
    updated: Vec<String>,
    not_updated: Vec<Skipped>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an update candidate.
    pub fn need_update(&mut self, artifact: &str, source: &str, new_version: &str) {
        self.needs_update.push(PendingUpdate {
            artifact: artifact.to_string(),
            source: source.to_string(),
            new_version: new_version.to_string(),
        });
    }

    /// Record a successful fetch and verification.
    pub fn mark_updated(&mut self, artifact: &str) {
        self.updated.push(artifact.to_string());
    }

    /// Record a package left at its current state.
    pub fn mark_not_updated(&mut self, artifact: &str, reason: impl fmt::Display) {
        self.not_updated.push(Skipped {
            artifact: artifact.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Append every entry of `other`, keeping its order.
    pub fn extend(&mut self, other: RunReport) {
        self.needs_update.extend(other.needs_update);
        self.updated.extend(other.updated);
        self.not_updated.extend(other.not_updated);
    }

    pub fn needs_update(&self) -> &[PendingUpdate] {
        &self.needs_update
    }

    pub fn updated(&self) -> &[String] {
        &self.updated
    }

    pub fn not_updated(&self) -> &[Skipped] {
        &self.not_updated
    }

    /// Render the run log text.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== NEED UPDATE ===")?;
        for p in &self.needs_update {
            writeln!(f, "- {}: {} -> {}", p.artifact, p.source, p.new_version)?;
        }
        writeln!(f)?;
        writeln!(f, "=== UPDATED ===")?;
        for artifact in &self.updated {
            writeln!(f, "- {artifact} updated")?;
        }
        writeln!(f)?;
        writeln!(f, "=== NOT UPDATED ===")?;
        for s in &self.not_updated {
            writeln!(f, "- {}: {}", s.artifact, s.reason)?;
        }
        Ok(())
    }
}

/// Outcome of a `fetch` pass over every manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Artifacts downloaded in this pass.
    pub fetched: Vec<String>,
    /// Packages that already had an artifact.
    pub present: Vec<String>,
    /// Packages that could not be fetched, with the reason.
    pub failed: Vec<Skipped>,
}

impl FetchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
