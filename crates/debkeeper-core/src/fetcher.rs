//! Artifact download, naming, and deduplication.
//!
//! The store keeps exactly one artifact per (name, arch). A fetch downloads
//! the whole body first, then under that key's lock writes the new file
//! atomically and removes every other file for the key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::artifact::{Artifact, ArtifactKey, ARTIFACT_EXTENSION};
use crate::error::{MirrorError, Result};
use crate::http::HttpTransport;
use crate::integrity::ContentHash;
use crate::manifest::Package;
use crate::store::ArtifactStore;

/// Why an artifact is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Filling in a missing artifact; a recorded signature must match.
    Plain,
    /// Moving to a new version; the returned signature replaces the old one.
    Updating,
    /// Downloading for a verification report, which records any mismatch.
    Verifying,
}

/// One mutex per artifact key, created on first use.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<ArtifactKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `key`.
    pub fn get(&self, key: &ArtifactKey) -> Arc<Mutex<()>> {
        let mut map = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(map.entry(key.clone()).or_default())
    }
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Check that a rendered source URL can be fetched at all.
pub fn check_source(url: &str) -> Result<()> {
    let lower = url.to_ascii_lowercase();
    let http = lower.starts_with("http://") || lower.starts_with("https://");
    if http && lower.ends_with(ARTIFACT_EXTENSION) {
        Ok(())
    } else {
        Err(MirrorError::UnsupportedSource {
            source_url: url.to_string(),
        })
    }
}

/// Whether the store already holds an artifact for `package`, at any version.
pub fn has_artifact(store: &dyn ArtifactStore, package: &Package) -> Result<bool> {
    let key = ArtifactKey::for_package(package);
    Ok(store.list_artifacts()?.iter().any(|name| key.matches(name)))
}

/// Downloads artifacts into an [`ArtifactStore`].
pub struct Fetcher<'a> {
    transport: &'a dyn HttpTransport,
    store: &'a dyn ArtifactStore,
    locks: KeyedLocks,
}

impl<'a> Fetcher<'a> {
    pub fn new(transport: &'a dyn HttpTransport, store: &'a dyn ArtifactStore) -> Self {
        Fetcher {
            transport,
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Fetch `package` at `version`.
    ///
    /// On error the store is unchanged: nothing partial is written and no
    /// existing artifact is removed.
    pub fn fetch(&self, package: &Package, version: &str, mode: FetchMode) -> Result<Artifact> {
        let url = package.source_url(version);
        check_source(&url)?;

        let key = ArtifactKey::for_package(package);
        let file_name = key.file_name(version);
        log::info!("fetching {file_name} from {url}");

        let response = self.transport.get(&url)?;
        if !response.is_success() {
            return Err(MirrorError::HttpStatus {
                url,
                status: response.status,
            });
        }

        let hash = ContentHash::compute(&response.body);
        if mode == FetchMode::Plain {
            if let Some(expected) = package.signature.as_deref() {
                if !hash.matches(expected) {
                    return Err(MirrorError::SignatureMismatch {
                        artifact: file_name,
                        expected: expected.to_string(),
                        actual: hash.0,
                    });
                }
            }
        }

        let lock = self.locks.get(&key);
        let _guard = hold(&lock);

        let path = self.store.write_artifact(&file_name, &response.body)?;
        for existing in self.store.list_artifacts()? {
            if existing != file_name && key.matches(&existing) {
                log::info!("removing superseded artifact {existing}");
                self.store.remove_artifact(&existing)?;
            }
        }

        log::debug!("{file_name}: {} bytes, sha256 {hash}", response.body.len());
        Ok(Artifact {
            file_name,
            path,
            version: version.to_string(),
            signature: hash.0,
        })
    }
}
