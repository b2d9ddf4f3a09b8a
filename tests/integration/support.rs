//! Shared fixtures: in-memory and failing remotes, a canned generator.

use async_trait::async_trait;
use script_magic::error::{ApiError, RemoteError};
use script_magic::provider::{GeneratedScript, ScriptGenerator};
use script_magic::registry::ScriptRegistry;
use script_magic::remote::{
    Blob, BlobService, BlobSummary, BlockingBlobService, MemoryBlobService, MirrorClient,
    RemoteMirror,
};
use script_magic::store::{LocalStore, RemoteIdFile};
use script_magic::sync::Synchronizer;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Every call fails as if the network were down.
pub struct FailingBlobService;

#[async_trait]
impl BlobService for FailingBlobService {
    async fn create_blob(&self, _: &str, _: &str, _: &str) -> Result<String, RemoteError> {
        Err(RemoteError::Unavailable("connection refused".to_string()))
    }

    async fn read_blob(&self, _: &str) -> Result<Blob, RemoteError> {
        Err(RemoteError::Unavailable("connection refused".to_string()))
    }

    async fn update_blob(&self, _: &str, _: &str, _: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("connection refused".to_string()))
    }

    async fn list_blobs(&self) -> Result<Vec<BlobSummary>, RemoteError> {
        Err(RemoteError::Unavailable("connection refused".to_string()))
    }
}

/// Returns the same script for every prompt.
pub struct CannedGenerator {
    pub code: String,
}

#[async_trait]
impl ScriptGenerator for CannedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedScript, ApiError> {
        Ok(GeneratedScript {
            code: self.code.clone(),
            description: "Prints a greeting".to_string(),
            tags: vec!["greeting".to_string()],
        })
    }
}

pub fn mirror_over(service: Arc<dyn BlobService>) -> Arc<dyn RemoteMirror> {
    let blobs = BlockingBlobService::new(service, Duration::from_secs(5)).unwrap();
    Arc::new(MirrorClient::new(Arc::new(blobs)))
}

pub fn synchronizer(dir: &Path, service: Option<Arc<dyn BlobService>>) -> Synchronizer {
    Synchronizer::new(
        LocalStore::in_dir(dir),
        RemoteIdFile::in_dir(dir),
        service.map(mirror_over),
    )
    .unwrap()
}

pub fn memory() -> Arc<MemoryBlobService> {
    Arc::new(MemoryBlobService::new())
}

pub fn registry(dir: &Path, service: Option<Arc<dyn BlobService>>) -> ScriptRegistry {
    ScriptRegistry::new(synchronizer(dir, service), true)
}
