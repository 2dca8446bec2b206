//! `debkeeper.toml` configuration.
//!
//! The file is optional. When present it is discovered by walking upward from
//! the working directory, and relative paths inside it resolve against the
//! directory it was found in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

/// Configuration file name.
pub const CONFIG_FILE: &str = "debkeeper.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MirrorConfig {
    /// Directory layout.
    pub paths: PathsConfig,
    /// Upstream HTTP settings.
    pub http: HttpConfig,
    /// External verification tools.
    pub tools: ToolsConfig,
    /// Batch update behavior.
    pub update: UpdateConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Directory of package manifests (`*.toml`).
    pub manifests: PathBuf,
    /// Flat directory of `.deb` artifacts.
    pub artifacts: PathBuf,
    /// Per-run verification reports, run log, and archives.
    pub reports: PathBuf,
    /// Report written by the standalone `verify` command.
    pub verification: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            manifests: PathBuf::from("apps"),
            artifacts: PathBuf::from("apps"),
            reports: PathBuf::from("updates"),
            verification: PathBuf::from("verification.txt"),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// `User-Agent` header; the release API rejects requests without one.
    pub user_agent: String,
    /// Base URL of the release-hosting API.
    pub release_api: String,
    /// Environment variable holding a bearer token for the release API.
    pub token_env: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 30,
            user_agent: format!("debkeeper/{}", env!("CARGO_PKG_VERSION")),
            release_api: "https://api.github.com".to_string(),
            token_env: None,
        }
    }
}

/// An external command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the artifact path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Build a command from a program and leading arguments.
    pub fn new(program: &str, args: &[&str]) -> Self {
        ToolCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolsConfig {
    /// Package linter.
    pub linter: ToolCommand,
    /// Package metadata dumper.
    pub metadata: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            linter: ToolCommand::new("lintian", &[]),
            metadata: ToolCommand::new("dpkg-deb", &["--info"]),
        }
    }
}

/// `[update]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpdateConfig {
    /// Manifests processed concurrently.
    pub jobs: usize,
    /// Persist the new version only after the artifact is fetched.
    pub defer_version_commit: bool,
    /// Bundle reports into a timestamped zip after `update`.
    pub archive_reports: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            jobs: 1,
            defer_version_commit: false,
            archive_reports: true,
        }
    }
}

impl MirrorConfig {
    /// Parse a configuration from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let config: MirrorConfig =
            toml::from_str(input).map_err(|e| MirrorError::MalformedDocument {
                detail: format!("{CONFIG_FILE}: {}", e.message()),
            })?;
        if config.update.jobs == 0 {
            return Err(MirrorError::MalformedDocument {
                detail: format!("{CONFIG_FILE}: update.jobs must be at least 1"),
            });
        }
        if config.http.timeout_secs == 0 {
            return Err(MirrorError::MalformedDocument {
                detail: format!("{CONFIG_FILE}: http.timeout-secs must be at least 1"),
            });
        }
        Ok(config)
    }

    /// Load a configuration file, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::store(path, e))?;
        let config = Self::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.rooted_at(base))
    }

    /// Search upward from `start_dir` for `debkeeper.toml`; fall back to
    /// defaults rooted at `start_dir` when none exists.
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                log::debug!("using configuration {}", candidate.display());
                return Self::load(&candidate);
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(MirrorConfig::default().rooted_at(start_dir))
    }

    /// Resolve every relative path against `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        let paths = &mut self.paths;
        for p in [
            &mut paths.manifests,
            &mut paths.artifacts,
            &mut paths.reports,
            &mut paths.verification,
        ] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
        self
    }
}
