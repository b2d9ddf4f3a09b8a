//! Blocking adapter over an async `BlobService`.

use super::{Blob, BlobService, BlobSummary};
use crate::error::{ApiError, RemoteError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs blob calls to completion on a private runtime, each under a timeout.
///
/// Must not be called from inside another tokio runtime.
pub struct BlockingBlobService {
    service: Arc<dyn BlobService>,
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl BlockingBlobService {
    pub fn new(service: Arc<dyn BlobService>, timeout: Duration) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        Ok(Self {
            service,
            runtime,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drive an unrelated future (e.g. script generation) on the same runtime, without the blob timeout.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    fn run<T, F>(&self, fut: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let timeout = self.timeout;
        self.runtime.block_on(async move {
            tokio::time::timeout(timeout, fut).await.map_err(|_| {
                RemoteError::Unavailable(format!("request timed out after {}s", timeout.as_secs()))
            })?
        })
    }

    pub fn create_blob(
        &self,
        file_name: &str,
        content: &str,
        description: &str,
    ) -> Result<String, RemoteError> {
        self.run(self.service.create_blob(file_name, content, description))
    }

    pub fn read_blob(&self, id: &str) -> Result<Blob, RemoteError> {
        self.run(self.service.read_blob(id))
    }

    pub fn update_blob(&self, id: &str, file_name: &str, content: &str) -> Result<(), RemoteError> {
        self.run(self.service.update_blob(id, file_name, content))
    }

    pub fn list_blobs(&self) -> Result<Vec<BlobSummary>, RemoteError> {
        self.run(self.service.list_blobs())
    }
}
