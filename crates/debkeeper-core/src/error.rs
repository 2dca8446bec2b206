//! Mirror error types.

use std::path::PathBuf;

/// Errors that can occur while curating the package mirror.
///
/// Every variant is caught per manifest by the orchestrator and turned into a
/// run-report line; none of them abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The manifest document could not be parsed at all.
    #[error("malformed manifest: {detail}")]
    MalformedDocument { detail: String },

    /// A required manifest field is absent or empty.
    #[error("missing required field '{path}'")]
    MissingField { path: String },

    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The manifest source is not an HTTP(S) URL to a `.deb` file.
    #[error("unsupported source '{source_url}': expected an http(s) URL ending in .deb")]
    UnsupportedSource { source_url: String },

    /// Reading or writing the manifest, artifact, or report stores failed.
    #[error("store error at {path}: {detail}")]
    Store { path: PathBuf, detail: String },

    /// One or more verification sections could not be executed.
    #[error("verification incomplete: {}", sections.join(", "))]
    VerificationIncomplete { sections: Vec<String> },

    /// The fetched artifact does not hash to the expected signature.
    #[error("signature mismatch for {artifact}: expected {expected}, got {actual}")]
    SignatureMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Report archive could not be written.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes used for diagnostics and report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or incomplete manifest.
    Validation,
    /// Network or HTTP failure; retried on the next run.
    Transport,
    /// Manifest references a source that cannot be fetched.
    UnsupportedSource,
    /// Download or filesystem write failure.
    Fetch,
    /// A verification section failed to execute or did not match.
    Verification,
}

impl MirrorError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::MalformedDocument { .. } | MirrorError::MissingField { .. } => {
                ErrorKind::Validation
            }
            MirrorError::Transport { .. }
            | MirrorError::Timeout { .. }
            | MirrorError::HttpStatus { .. } => ErrorKind::Transport,
            MirrorError::UnsupportedSource { .. } => ErrorKind::UnsupportedSource,
            MirrorError::VerificationIncomplete { .. } | MirrorError::SignatureMismatch { .. } => {
                ErrorKind::Verification
            }
            MirrorError::Store { .. }
            | MirrorError::Archive(_)
            | MirrorError::TomlSerialize(_)
            | MirrorError::Json(_)
            | MirrorError::Io(_) => ErrorKind::Fetch,
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, detail: impl std::fmt::Display) -> Self {
        MirrorError::Store {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
