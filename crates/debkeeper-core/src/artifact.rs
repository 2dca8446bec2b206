//! Deterministic artifact naming.
//!
//! Every artifact in the store is named `{name}_{version}_{arch}.deb`, where
//! `arch` is the Debian spelling of the manifest's architecture. At most one
//! artifact per (name, arch) pair is kept.

use std::path::PathBuf;

use crate::manifest::Package;

/// File extension of mirrored artifacts.
pub const ARTIFACT_EXTENSION: &str = ".deb";

/// Map an architecture to its Debian spelling.
///
/// Only `x86_64` is rewritten (to `amd64`); everything else passes through.
pub fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        other => other,
    }
}

/// Canonical artifact file name for a package at `version`.
pub fn artifact_file_name(name: &str, version: &str, arch: &str) -> String {
    format!(
        "{name}_{version}_{}{ARTIFACT_EXTENSION}",
        normalize_arch(arch)
    )
}

/// The identity an artifact is deduplicated under: one file per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    /// Package name.
    pub name: String,
    /// Normalized architecture.
    pub arch: String,
}

impl ArtifactKey {
    /// Build a key, normalizing the architecture.
    pub fn new(name: &str, arch: &str) -> Self {
        ArtifactKey {
            name: name.to_string(),
            arch: normalize_arch(arch).to_string(),
        }
    }

    /// Key for a manifest's package.
    pub fn for_package(package: &Package) -> Self {
        Self::new(&package.name, &package.arch)
    }

    /// Canonical file name for this key at `version`.
    pub fn file_name(&self, version: &str) -> String {
        artifact_file_name(&self.name, version, &self.arch)
    }

    /// Whether an artifact file belongs to this key.
    ///
    /// Matches `{name}_…_{arch}.deb`, so `tool` does not claim
    /// `toolkit_1.0_amd64.deb` and `amd64` does not claim `i386` builds.
    pub fn matches(&self, file_name: &str) -> bool {
        let suffix = format!("_{}{ARTIFACT_EXTENSION}", self.arch);
        file_name
            .strip_prefix(&self.name)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| rest.ends_with(&suffix))
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.arch)
    }
}

/// A fetched artifact in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Canonical file name.
    pub file_name: String,
    /// Location in the artifact store.
    pub path: PathBuf,
    /// Version the artifact was fetched for.
    pub version: String,
    /// SHA-256 of the downloaded bytes.
    pub signature: String,
}
