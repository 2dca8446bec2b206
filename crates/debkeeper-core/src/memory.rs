//! In-memory implementations of the store and transport seams.
//!
//! These back the pipeline's tests. They are `Sync` so they can be shared
//! across a parallel batch.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::{MirrorError, Result};
use crate::http::{HttpResponse, HttpTransport};
use crate::manifest::Manifest;
use crate::store::{ArtifactStore, ManifestStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Manifests held as raw document text.
#[derive(Debug, Default)]
pub struct MemoryManifestStore {
    docs: Mutex<BTreeMap<String, String>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert(&self, id: &str, text: &str) {
        lock(&self.docs).insert(id.to_string(), text.to_string());
    }

    /// Current document text.
    pub fn get(&self, id: &str) -> Option<String> {
        lock(&self.docs).get(id).cloned()
    }
}

impl ManifestStore for MemoryManifestStore {
    fn list_manifests(&self) -> Result<Vec<String>> {
        Ok(lock(&self.docs).keys().cloned().collect())
    }

    fn read_manifest(&self, id: &str) -> Result<String> {
        self.get(id)
            .ok_or_else(|| MirrorError::store(id, "no such manifest"))
    }

    fn save_manifest(&self, id: &str, manifest: &Manifest) -> Result<()> {
        let text = manifest.to_toml()?;
        lock(&self.docs).insert(id.to_string(), text);
        Ok(())
    }
}

/// Artifacts held as byte vectors under a virtual `memory/` root.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: bool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, leaving contents untouched.
    pub fn failing_writes() -> Self {
        MemoryArtifactStore {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Add an artifact directly.
    pub fn insert(&self, file_name: &str, data: &[u8]) {
        lock(&self.files).insert(file_name.to_string(), data.to_vec());
    }

    /// Stored bytes of an artifact.
    pub fn contents(&self, file_name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(file_name).cloned()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn list_artifacts(&self) -> Result<Vec<String>> {
        Ok(lock(&self.files).keys().cloned().collect())
    }

    fn remove_artifact(&self, file_name: &str) -> Result<()> {
        lock(&self.files).remove(file_name);
        Ok(())
    }

    fn write_artifact(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        if self.fail_writes {
            return Err(MirrorError::store(
                self.artifact_path(file_name),
                "write rejected",
            ));
        }
        lock(&self.files).insert(file_name.to_string(), data.to_vec());
        Ok(self.artifact_path(file_name))
    }

    fn artifact_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from("memory").join(file_name)
    }
}

/// Canned behavior for one URL.
#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, body: Vec<u8> },
    Fail(String),
    Timeout,
}

/// Request method recorded by [`MemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// Transport answering from a route table. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<(Method, String)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `status` and `body`.
    pub fn respond(&self, url: &str, status: u16, body: &[u8]) -> &Self {
        lock(&self.routes).insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.to_vec(),
            },
        );
        self
    }

    /// Fail requests to `url` without a response.
    pub fn fail(&self, url: &str, detail: &str) -> &Self {
        lock(&self.routes).insert(url.to_string(), Route::Fail(detail.to_string()));
        self
    }

    /// Time out requests to `url`.
    pub fn time_out(&self, url: &str) -> &Self {
        lock(&self.routes).insert(url.to_string(), Route::Timeout);
        self
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<(Method, String)> {
        lock(&self.log).clone()
    }

    /// Number of requests made with `method`.
    pub fn count(&self, method: Method) -> usize {
        lock(&self.log).iter().filter(|(m, _)| *m == method).count()
    }

    fn answer(&self, method: Method, url: &str) -> Result<HttpResponse> {
        lock(&self.log).push((method, url.to_string()));
        match lock(&self.routes).get(url).cloned() {
            Some(Route::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(Route::Fail(detail)) => Err(MirrorError::Transport {
                url: url.to_string(),
                detail,
            }),
            Some(Route::Timeout) => Err(MirrorError::Timeout {
                url: url.to_string(),
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}

impl HttpTransport for MemoryTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.answer(Method::Get, url)
    }

    fn head(&self, url: &str) -> Result<u16> {
        self.answer(Method::Head, url).map(|r| r.status)
    }
}
