//! Artifact verification reports.
//!
//! Three independent checks run against a fetched artifact, always in this
//! order and always all three:
//!
//! 1. signature: SHA-256 of the file against the manifest's signature
//! 2. lint: the package linter (`lintian` by default)
//! 3. metadata: the metadata dumper (`dpkg-deb --info` by default)
//!
//! A check that cannot run records why in its own section; the others still
//! run, and the report is still written.

use std::path::Path;

use crate::config::{ToolCommand, ToolsConfig};
use crate::error::{MirrorError, Result};
use crate::integrity::ContentHash;
use crate::store::write_atomic;
use crate::tools::ToolRunner;

/// What the signature section should compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Compare with a signature recorded in the manifest.
    Expect(String),
    /// The signature was computed from this same download.
    Skip,
    /// The manifest has no signature to compare with.
    Unrecorded,
}

/// Report section identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Signature,
    Lint,
    Metadata,
}

impl SectionKind {
    /// Heading used in the rendered report.
    pub fn heading(&self) -> &'static str {
        match self {
            SectionKind::Signature => "SIGNATURE VERIFICATION",
            SectionKind::Lint => "LINTIAN OUTPUT",
            SectionKind::Metadata => "DPKG-DEB OUTPUT",
        }
    }

    /// Short label for error messages.
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Signature => "signature",
            SectionKind::Lint => "lint",
            SectionKind::Metadata => "metadata",
        }
    }
}

/// Outcome of the signature comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Match,
    Mismatch { expected: String, actual: String },
    Skipped,
    /// The file could not be hashed.
    Unavailable,
}

/// One section of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub kind: SectionKind,
    /// Captured text.
    pub body: String,
    /// Why the check could not run, if it could not.
    pub failure: Option<String>,
}

/// The three-section verification report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub sections: Vec<ReportSection>,
    pub signature: SignatureStatus,
}

impl VerificationReport {
    /// Render the report text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("=== {} ===\n", section.kind.heading()));
            out.push_str(&section.body);
        }
        out
    }

    /// Whether every section ran.
    pub fn is_complete(&self) -> bool {
        self.sections.iter().all(|s| s.failure.is_none())
    }

    /// Labels of sections that could not run.
    pub fn incomplete_sections(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.failure.is_some())
            .map(|s| s.kind.label().to_string())
            .collect()
    }

    /// `false` only for a definite mismatch.
    pub fn signature_matches(&self) -> bool {
        !matches!(self.signature, SignatureStatus::Mismatch { .. })
    }

    /// Turn a failed or incomplete report into an error for `artifact`.
    pub fn check(&self, artifact: &str) -> Result<()> {
        if let SignatureStatus::Mismatch { expected, actual } = &self.signature {
            return Err(MirrorError::SignatureMismatch {
                artifact: artifact.to_string(),
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
        if !self.is_complete() {
            return Err(MirrorError::VerificationIncomplete {
                sections: self.incomplete_sections(),
            });
        }
        Ok(())
    }
}

/// Runs the verification checks.
pub struct Verifier<'a> {
    runner: &'a dyn ToolRunner,
    tools: &'a ToolsConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(runner: &'a dyn ToolRunner, tools: &'a ToolsConfig) -> Self {
        Verifier { runner, tools }
    }

    /// Verify the artifact at `artifact` and write the report to `output`.
    ///
    /// Fails without a report only if the artifact does not exist. A report
    /// that could not be written is an error, but the report is returned
    /// in every other case regardless of section outcomes.
    pub fn verify(
        &self,
        artifact: &Path,
        expected: &SignatureCheck,
        output: &Path,
    ) -> Result<VerificationReport> {
        if !artifact.is_file() {
            return Err(MirrorError::store(artifact, "artifact not found"));
        }
        log::info!("verifying {}", artifact.display());

        let report = self.build_report(artifact, expected);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MirrorError::store(parent, e))?;
            }
        }
        write_atomic(output, report.render().as_bytes())?;
        log::debug!("verification report written to {}", output.display());

        if !report.is_complete() {
            log::warn!(
                "verification of {} incomplete: {}",
                artifact.display(),
                report.incomplete_sections().join(", ")
            );
        }
        Ok(report)
    }

    /// Run all three checks without writing anything.
    pub fn build_report(&self, artifact: &Path, expected: &SignatureCheck) -> VerificationReport {
        let (signature_section, signature) = signature_section(artifact, expected);
        let lint = self.tool_section(SectionKind::Lint, &self.tools.linter, artifact);
        let metadata = self.tool_section(SectionKind::Metadata, &self.tools.metadata, artifact);
        VerificationReport {
            sections: vec![signature_section, lint, metadata],
            signature,
        }
    }

    fn tool_section(&self, kind: SectionKind, tool: &ToolCommand, artifact: &Path) -> ReportSection {
        match self.runner.run(tool, artifact) {
            Ok(out) => {
                let mut body = out.output;
                if !out.success {
                    if !body.is_empty() && !body.ends_with('\n') {
                        body.push('\n');
                    }
                    match out.code {
                        Some(code) => body.push_str(&format!("[{} exited with status {code}]\n", tool.program)),
                        None => body.push_str(&format!("[{} terminated by signal]\n", tool.program)),
                    }
                }
                ReportSection {
                    kind,
                    body,
                    failure: None,
                }
            }
            Err(e) => {
                let reason = format!("failed to run {}: {e}", tool.program);
                ReportSection {
                    kind,
                    body: format!("{reason}\n"),
                    failure: Some(reason),
                }
            }
        }
    }
}

fn signature_section(artifact: &Path, expected: &SignatureCheck) -> (ReportSection, SignatureStatus) {
    let hash = match ContentHash::compute_file(artifact) {
        Ok(hash) => hash,
        Err(e) => {
            let reason = format!("failed to hash artifact: {e}");
            let section = ReportSection {
                kind: SectionKind::Signature,
                body: format!("{reason}\n"),
                failure: Some(reason),
            };
            return (section, SignatureStatus::Unavailable);
        }
    };

    let mut body = hash.sum_line(artifact);
    let status = match expected {
        SignatureCheck::Skip => {
            body.push_str("signature: skipped (generated during fetch)\n");
            SignatureStatus::Skipped
        }
        SignatureCheck::Unrecorded => {
            body.push_str("signature: not recorded in manifest\n");
            SignatureStatus::Skipped
        }
        SignatureCheck::Expect(sig) if hash.matches(sig) => {
            body.push_str("signature: match\n");
            SignatureStatus::Match
        }
        SignatureCheck::Expect(sig) => {
            log::warn!("signature mismatch for {}: {} != {sig}", artifact.display(), hash);
            body.push_str(&format!("signature: MISMATCH (expected {sig})\n"));
            SignatureStatus::Mismatch {
                expected: sig.clone(),
                actual: hash.as_str().to_string(),
            }
        }
    };

    let section = ReportSection {
        kind: SectionKind::Signature,
        body,
        failure: None,
    };
    (section, status)
}
