//! Package manifest parsing and persistence.
//!
//! One TOML document per package:
//!
//! ```toml
//! [submitter]
//! name = "Jane Doe"
//! email = "jane@example.org"
//! is_maintainer = true
//!
//! [package]
//! name = "tool"
//! version = "1.2.3"
//! summary = "A tool"
//! type = "cli"
//! license = "MIT"
//! source = "https://example.org/$pname-$pversion.deb"
//! arch = "x86_64"
//! auto_update = true
//! signature = "<sha256>"   # optional
//! ```
//!
//! Validation is total and does no I/O beyond reading the document. Fields
//! the pipeline does not own are kept in `extra` tables so they survive a
//! load/save cycle.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};
use crate::store::write_atomic;
use crate::template;

/// Required string fields of `[submitter]`.
const SUBMITTER_STRING_FIELDS: &[&str] = &["name", "email"];
/// Required boolean fields of `[submitter]`.
const SUBMITTER_FLAG_FIELDS: &[&str] = &["is_maintainer"];
/// Required string fields of `[package]`.
const PACKAGE_STRING_FIELDS: &[&str] = &[
    "name", "version", "summary", "type", "license", "source", "arch",
];
/// Required boolean fields of `[package]`.
const PACKAGE_FLAG_FIELDS: &[&str] = &["auto_update"];

/// A validated package manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Who declared the package.
    pub submitter: Submitter,
    /// The package itself.
    pub package: Package,
    /// Any other top-level tables, preserved verbatim.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Submitter section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submitter {
    pub name: String,
    pub email: String,
    pub is_maintainer: bool,
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Package section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Package name, also the artifact file-name prefix.
    pub name: String,
    /// Currently mirrored version.
    pub version: String,
    pub summary: String,
    /// Package type as declared by the submitter.
    #[serde(rename = "type")]
    pub kind: String,
    pub license: String,
    /// Download URL template (see [`crate::template`]).
    pub source: String,
    /// Architecture as declared, e.g. `x86_64`.
    pub arch: String,
    /// Whether `update` may move this package to newer releases.
    pub auto_update: bool,
    /// SHA-256 of the mirrored artifact, filled in at fetch time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Manifest {
    /// Parse and validate a manifest from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(input).map_err(|e| MirrorError::MalformedDocument {
                detail: e.message().to_string(),
            })?;

        check_section(
            &table,
            "submitter",
            SUBMITTER_STRING_FIELDS,
            SUBMITTER_FLAG_FIELDS,
        )?;
        check_section(&table, "package", PACKAGE_STRING_FIELDS, PACKAGE_FLAG_FIELDS)?;

        let mut manifest: Manifest =
            toml::Value::Table(table)
                .try_into()
                .map_err(|e: toml::de::Error| MirrorError::MalformedDocument {
                    detail: e.message().to_string(),
                })?;

        // An empty signature means "not computed yet".
        if manifest
            .package
            .signature
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            manifest.package.signature = None;
        }

        Ok(manifest)
    }

    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        log::debug!("parsing manifest {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::store(path, e))?;
        Self::parse(&content)
    }

    /// Serialize this manifest to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Atomically rewrite the manifest at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        write_atomic(path, content.as_bytes())
    }

    /// Best-effort read of `package.name` from a document that may not
    /// validate, so failures can still be attributed to a package.
    pub fn peek_name(input: &str) -> Option<String> {
        let table: toml::Table = toml::from_str(input).ok()?;
        let name = table.get("package")?.get("name")?.as_str()?;
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Best-effort read of `package.auto_update` from a document that may
    /// not validate.
    pub fn peek_auto_update(input: &str) -> Option<bool> {
        let table: toml::Table = toml::from_str(input).ok()?;
        table.get("package")?.get("auto_update")?.as_bool()
    }
}

impl Package {
    /// The source URL with placeholders filled in for `version`.
    pub fn source_url(&self, version: &str) -> String {
        template::render(&self.source, &self.name, version)
    }
}

/// Check that a section exists and every required field is present and
/// non-empty.
fn check_section(
    table: &toml::Table,
    section: &str,
    strings: &[&str],
    flags: &[&str],
) -> Result<()> {
    let Some(body) = table.get(section).and_then(toml::Value::as_table) else {
        return Err(MirrorError::MissingField {
            path: section.to_string(),
        });
    };

    for field in strings {
        let present = match body.get(*field) {
            Some(toml::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
            None => false,
        };
        if !present {
            return Err(MirrorError::MissingField {
                path: format!("{section}.{field}"),
            });
        }
    }

    for field in flags {
        if !body.contains_key(*field) {
            return Err(MirrorError::MissingField {
                path: format!("{section}.{field}"),
            });
        }
    }

    Ok(())
}
