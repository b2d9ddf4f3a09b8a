//! Remote blob storage and the mapping mirror built on top of it.
//!
//! `BlobService` is the async port to a remote text-blob store (GitHub gists in
//! production). `RemoteMirror` is the blocking surface the synchronizer uses to
//! treat one of those blobs as the canonical copy of the whole mapping.

pub mod blocking;
pub mod gist;
pub mod memory;
pub mod mirror;

pub use blocking::BlockingBlobService;
pub use gist::GistClient;
pub use memory::MemoryBlobService;
pub use mirror::{MirrorClient, MIRROR_DESCRIPTION, MIRROR_FILE_NAME, MIRROR_MARKER};

use crate::error::RemoteError;
use crate::types::MappingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A blob fetched in full.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub id: String,
    pub description: String,
    pub file_name: String,
    pub content: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Listing entry for a blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobSummary {
    pub id: String,
    pub description: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Remote text-blob storage.
#[async_trait]
pub trait BlobService: Send + Sync {
    /// Create a blob holding one file; returns its identifier.
    async fn create_blob(
        &self,
        file_name: &str,
        content: &str,
        description: &str,
    ) -> Result<String, RemoteError>;

    async fn read_blob(&self, id: &str) -> Result<Blob, RemoteError>;

    /// Replace the content of `file_name` inside blob `id`.
    async fn update_blob(&self, id: &str, file_name: &str, content: &str)
        -> Result<(), RemoteError>;

    async fn list_blobs(&self) -> Result<Vec<BlobSummary>, RemoteError>;
}

/// Canonical remote copy of the mapping store.
pub trait RemoteMirror: Send + Sync {
    /// Upload `store`. Creates a new blob when `existing_id` is `None` and returns
    /// its identifier; otherwise overwrites and returns `existing_id` unchanged.
    fn push(&self, store: &MappingStore, existing_id: Option<&str>) -> Result<String, RemoteError>;

    /// Fetch and decode the mirror at `id`.
    fn pull(&self, id: &str) -> Result<MappingStore, RemoteError>;

    /// Best single mirror candidate on the account, if any.
    fn discover(&self) -> Result<Option<String>, RemoteError>;
}
