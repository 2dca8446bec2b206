//! Manifest and artifact repositories.
//!
//! The pipeline never touches the filesystem directly; it goes through these
//! traits so it can run against the in-memory stores in
//! [`crate::memory`]. The filesystem implementations below are what the CLI
//! uses.
//!
//! Layout (defaults):
//! ```text
//! apps/
//!   tool.toml                 # manifest, id "tool.toml"
//!   tool_1.2.3_amd64.deb      # artifact
//! updates/
//!   tool.txt                  # verification report
//!   update_log.txt            # run log
//! ```

use std::path::{Path, PathBuf};

use crate::artifact::ARTIFACT_EXTENSION;
use crate::config::CONFIG_FILE;
use crate::error::{MirrorError, Result};
use crate::manifest::Manifest;

/// Extension of manifest documents.
pub const MANIFEST_EXTENSION: &str = ".toml";

/// Source of package manifests, addressed by id (the file name).
pub trait ManifestStore: Send + Sync {
    /// All manifest ids, sorted.
    fn list_manifests(&self) -> Result<Vec<String>>;

    /// Raw document text.
    fn read_manifest(&self, id: &str) -> Result<String>;

    /// Replace a manifest.
    fn save_manifest(&self, id: &str, manifest: &Manifest) -> Result<()>;

    /// Read and validate a manifest.
    fn load_manifest(&self, id: &str) -> Result<Manifest> {
        Manifest::parse(&self.read_manifest(id)?)
    }
}

/// Flat store of artifact files, addressed by file name.
pub trait ArtifactStore: Send + Sync {
    /// All artifact file names, sorted.
    fn list_artifacts(&self) -> Result<Vec<String>>;

    /// Delete an artifact. Removing a missing artifact is not an error.
    fn remove_artifact(&self, file_name: &str) -> Result<()>;

    /// Write an artifact so that readers see either the old file or the
    /// complete new one, never a partial write. Returns its location.
    fn write_artifact(&self, file_name: &str, data: &[u8]) -> Result<PathBuf>;

    /// Location an artifact is (or would be) stored at.
    fn artifact_path(&self, file_name: &str) -> PathBuf;
}

/// Report file name for a manifest id: `tool.toml` → `tool.txt`.
pub fn report_file_name(manifest_id: &str) -> String {
    let stem = manifest_id
        .strip_suffix(MANIFEST_EXTENSION)
        .unwrap_or(manifest_id);
    format!("{stem}.txt")
}

/// Directory of `*.toml` manifests.
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    root: PathBuf,
}

impl FsManifestStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        FsManifestStore { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a manifest id.
    pub fn manifest_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl ManifestStore for FsManifestStore {
    fn list_manifests(&self) -> Result<Vec<String>> {
        list_files(&self.root, |name| {
            name.ends_with(MANIFEST_EXTENSION) && name != CONFIG_FILE
        })
    }

    fn read_manifest(&self, id: &str) -> Result<String> {
        let path = self.manifest_path(id);
        std::fs::read_to_string(&path).map_err(|e| MirrorError::store(path, e))
    }

    fn save_manifest(&self, id: &str, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path(id);
        log::debug!("writing manifest {}", path.display());
        manifest.save(&path)
    }
}

/// Flat directory of `.deb` files.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        FsArtifactStore { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn list_artifacts(&self) -> Result<Vec<String>> {
        list_files(&self.root, |name| name.ends_with(ARTIFACT_EXTENSION))
    }

    fn remove_artifact(&self, file_name: &str) -> Result<()> {
        let path = self.artifact_path(file_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MirrorError::store(path, e)),
        }
    }

    fn write_artifact(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| MirrorError::store(&self.root, e))?;
        let path = self.artifact_path(file_name);
        write_atomic(&path, data)?;
        Ok(path)
    }

    fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

/// Write `data` to a sibling temp file and rename it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MirrorError::store(dir, e))?;
    tmp.write_all(data).map_err(|e| MirrorError::store(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| MirrorError::store(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| MirrorError::store(path, e.error))?;
    Ok(())
}

/// Sorted names of regular files in `dir` accepted by `keep`.
/// A missing directory lists as empty.
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| MirrorError::store(dir, e))? {
        let entry = entry.map_err(|e| MirrorError::store(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if keep(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
