//! Core pipeline for a curated `.deb` mirror.
//!
//! One TOML manifest per package declares where its artifact comes from. The
//! pipeline checks upstream for newer releases, downloads and names artifacts
//! deterministically, and writes a verification report per artifact.
//!
//! # Architecture
//!
//! - **Manifest model** ([`manifest`]) validates and round-trips package
//!   declarations.
//! - **Version resolver** ([`resolver`]) decides whether upstream has a newer
//!   version, by release-API lookup or by increment probing.
//! - **Fetcher** ([`fetcher`]) downloads artifacts and keeps one per
//!   (name, arch).
//! - **Verifier** ([`verifier`]) hashes, lints, and inspects an artifact.
//! - **Orchestrator** ([`orchestrator`]) runs the batch and collects a
//!   [`RunReport`].
//!
//! Storage, HTTP, and external tools sit behind traits ([`ManifestStore`],
//! [`ArtifactStore`], [`HttpTransport`], [`ToolRunner`]) with filesystem,
//! `reqwest`, and subprocess implementations, plus in-memory fakes in
//! [`memory`].

pub mod archive;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod integrity;
pub mod manifest;
pub mod memory;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod store;
pub mod template;
pub mod tools;
pub mod verifier;

// Re-exports for convenience.
pub use archive::{archive_name, archive_reports};
pub use artifact::{artifact_file_name, normalize_arch, Artifact, ArtifactKey};
pub use config::{MirrorConfig, CONFIG_FILE};
pub use error::{ErrorKind, MirrorError, Result};
pub use fetcher::{FetchMode, Fetcher};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use integrity::ContentHash;
pub use manifest::{Manifest, Package, Submitter};
pub use orchestrator::{CheckEntry, Orchestrator};
pub use report::{FetchSummary, RunReport};
pub use resolver::{Resolver, Strategy, VersionCheckResult};
pub use store::{ArtifactStore, FsArtifactStore, FsManifestStore, ManifestStore};
pub use tools::{ProcessRunner, ToolOutput, ToolRunner};
pub use verifier::{SignatureCheck, VerificationReport, Verifier};
