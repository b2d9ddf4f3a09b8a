//! In-process blob service.
//!
//! Backs tests and embedders that run without a network. Can be switched
//! offline to simulate an unreachable remote.

use super::{Blob, BlobService, BlobSummary};
use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredBlob {
    description: String,
    file_name: String,
    content: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: BTreeMap<String, StoredBlob>,
    next_id: u64,
    ticks: i64,
}

impl Inner {
    /// Logical clock: each write is one second after the previous one.
    fn tick(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc.timestamp_opt(1_700_000_000 + self.ticks, 0)
            .single()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobService {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryBlobService {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `RemoteError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seed a blob directly, bypassing the offline switch.
    pub fn insert(&self, file_name: &str, content: &str, description: &str) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("mem{:04}", inner.next_id);
        let updated_at = inner.tick();
        inner.blobs.insert(
            id.clone(),
            StoredBlob {
                description: description.to_string(),
                file_name: file_name.to_string(),
                content: content.to_string(),
                updated_at,
            },
        );
        id
    }

    pub fn blob_count(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn content_of(&self, id: &str) -> Option<String> {
        self.lock().blobs.get(id).map(|b| b.content.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(
                "memory blob service is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobService for MemoryBlobService {
    async fn create_blob(
        &self,
        file_name: &str,
        content: &str,
        description: &str,
    ) -> Result<String, RemoteError> {
        self.check_online()?;
        Ok(self.insert(file_name, content, description))
    }

    async fn read_blob(&self, id: &str) -> Result<Blob, RemoteError> {
        self.check_online()?;
        let inner = self.lock();
        let blob = inner
            .blobs
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok(Blob {
            id: id.to_string(),
            description: blob.description.clone(),
            file_name: blob.file_name.clone(),
            content: blob.content.clone(),
            updated_at: Some(blob.updated_at),
        })
    }

    async fn update_blob(
        &self,
        id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut inner = self.lock();
        let updated_at = inner.tick();
        let blob = inner
            .blobs
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        blob.file_name = file_name.to_string();
        blob.content = content.to_string();
        blob.updated_at = updated_at;
        Ok(())
    }

    async fn list_blobs(&self) -> Result<Vec<BlobSummary>, RemoteError> {
        self.check_online()?;
        Ok(self
            .lock()
            .blobs
            .iter()
            .map(|(id, blob)| BlobSummary {
                id: id.clone(),
                description: blob.description.clone(),
                updated_at: Some(blob.updated_at),
            })
            .collect())
    }
}
