//! CLI command implementations.

pub mod archive;
pub mod check;
pub mod fetch;
pub mod update;
pub mod verify;

use anyhow::{Context, Result};

use debkeeper_core::{
    FsArtifactStore, FsManifestStore, MirrorConfig, Orchestrator, ProcessRunner, ReqwestTransport,
};

/// The real stores, transport, and tools for one invocation.
pub struct Mirror {
    pub config: MirrorConfig,
    manifests: FsManifestStore,
    artifacts: FsArtifactStore,
    transport: ReqwestTransport,
    tools: ProcessRunner,
}

impl Mirror {
    pub fn open(config: MirrorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.http).context("failed to set up HTTP client")?;
        Ok(Mirror {
            manifests: FsManifestStore::new(config.paths.manifests.clone()),
            artifacts: FsArtifactStore::new(config.paths.artifacts.clone()),
            transport,
            tools: ProcessRunner,
            config,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            &self.config,
            &self.manifests,
            &self.artifacts,
            &self.transport,
            &self.tools,
        )
    }
}
