//! Mapping mirror: one blob holding the serialized `MappingStore`.

use super::{BlockingBlobService, RemoteMirror};
use crate::error::RemoteError;
use crate::types::MappingStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Marker searched for in blob descriptions by `discover`.
pub const MIRROR_MARKER: &str = "[script-magic-mapping]";

/// Description given to newly created mirror blobs.
pub const MIRROR_DESCRIPTION: &str = "Script Magic mapping [script-magic-mapping]";

/// File name of the mapping inside the mirror blob.
pub const MIRROR_FILE_NAME: &str = "mapping.json";

/// `RemoteMirror` over a blob service.
pub struct MirrorClient {
    blobs: Arc<BlockingBlobService>,
}

impl MirrorClient {
    pub fn new(blobs: Arc<BlockingBlobService>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<BlockingBlobService> {
        &self.blobs
    }
}

impl RemoteMirror for MirrorClient {
    fn push(&self, store: &MappingStore, existing_id: Option<&str>) -> Result<String, RemoteError> {
        let content = store
            .to_json_pretty()
            .map_err(|e| RemoteError::Corrupt(format!("failed to serialize mapping: {}", e)))?;

        match existing_id {
            Some(id) => {
                self.blobs.update_blob(id, MIRROR_FILE_NAME, &content)?;
                debug!("Updated mapping mirror {}", id);
                Ok(id.to_string())
            }
            None => {
                let id = self
                    .blobs
                    .create_blob(MIRROR_FILE_NAME, &content, MIRROR_DESCRIPTION)?;
                info!("Created mapping mirror {}", id);
                Ok(id)
            }
        }
    }

    fn pull(&self, id: &str) -> Result<MappingStore, RemoteError> {
        let blob = self.blobs.read_blob(id)?;
        MappingStore::from_json(&blob.content)
            .map_err(|e| RemoteError::Corrupt(format!("mirror {}: {}", id, e)))
    }

    fn discover(&self) -> Result<Option<String>, RemoteError> {
        let candidates = self.blobs.list_blobs()?;
        let mut best: Option<&super::BlobSummary> = None;
        for candidate in candidates
            .iter()
            .filter(|b| b.description.contains(MIRROR_MARKER))
        {
            best = match best {
                Some(current) if candidate.updated_at <= current.updated_at => Some(current),
                _ => Some(candidate),
            };
        }
        if let Some(found) = best {
            debug!("Discovered mapping mirror {}", found.id);
        }
        Ok(best.map(|b| b.id.clone()))
    }
}
