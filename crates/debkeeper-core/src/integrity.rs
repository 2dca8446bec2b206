//! Content signatures for fetched artifacts.
//!
//! A manifest's `signature` field holds the lowercase SHA-256 hex digest of
//! the `.deb` it points at, in the same form `sha256sum` prints.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{MirrorError, Result};

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex_encode(&hasher.finalize()))
    }

    /// Hash a file on disk without loading it all into memory.
    pub fn compute_file(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path).map_err(|e| MirrorError::store(path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).map_err(|e| MirrorError::store(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(ContentHash(hex_encode(&hasher.finalize())))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a signature string as written in a manifest.
    ///
    /// Surrounding whitespace and hex case are ignored.
    pub fn matches(&self, signature: &str) -> bool {
        self.0.eq_ignore_ascii_case(signature.trim())
    }

    /// Render a line in `sha256sum` layout for the given path.
    pub fn sum_line(&self, path: &Path) -> String {
        format!("{}  {}\n", self.0, path.display())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
