//! Script registry: the name-keyed CRUD surface over the local store.
//!
//! Mutations are durable locally before anything touches the network. When
//! `auto_sync` is on, each successful mutation is followed by an opportunistic
//! `sync_mapping` whose failure is only logged.

use crate::error::ApiError;
use crate::sync::{SyncStatus, Synchronizer};
use crate::types::{Metadata, ScriptEntry, ScriptRecord, RESERVED_KEYS};
use chrono::Utc;
use tracing::{debug, info, warn};

pub struct ScriptRegistry {
    sync: Synchronizer,
    auto_sync: bool,
}

impl ScriptRegistry {
    pub fn new(sync: Synchronizer, auto_sync: bool) -> Self {
        Self { sync, auto_sync }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut Synchronizer {
        &mut self.sync
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    /// Create or replace the record under `name`; `createdAt` is set to now.
    pub fn add_script(&mut self, name: &str, remote_id: &str, metadata: Metadata) -> Result<(), ApiError> {
        let metadata = strip_reserved(name, metadata);
        let mut store = self.sync.local().read();
        let previous = store.upsert(
            name,
            ScriptEntry {
                remote_id: remote_id.to_string(),
                created_at: Utc::now(),
                metadata,
            },
        );
        self.sync.local().write(&store)?;
        if previous.is_some() {
            info!("Replaced script '{}' -> {}", name, remote_id);
        } else {
            info!("Added script '{}' -> {}", name, remote_id);
        }

        self.opportunistic_sync()?;
        Ok(())
    }

    /// Replace the metadata of an existing record, keeping `remoteId` and `createdAt`.
    /// Returns `false` without writing when `name` is unknown.
    pub fn update_metadata(&mut self, name: &str, metadata: Metadata) -> Result<bool, ApiError> {
        let metadata = strip_reserved(name, metadata);
        let mut store = self.sync.local().read();
        let Some(entry) = store.scripts.get_mut(name) else {
            debug!("Script '{}' not in mapping, nothing to update", name);
            return Ok(false);
        };
        entry.metadata = metadata;
        self.sync.local().write(&store)?;
        info!("Updated metadata for script '{}'", name);

        self.opportunistic_sync()?;
        Ok(true)
    }

    /// Local lookup; `None` on miss.
    pub fn lookup_script(&self, name: &str) -> Option<ScriptRecord> {
        self.sync.local().read().get(name)
    }

    pub fn list_scripts(&self) -> Vec<ScriptRecord> {
        self.sync.local().read().records()
    }

    /// Returns `false` without writing when `name` is unknown.
    pub fn remove_script(&mut self, name: &str) -> Result<bool, ApiError> {
        let mut store = self.sync.local().read();
        if store.remove(name).is_none() {
            debug!("Script '{}' not in mapping, nothing to remove", name);
            return Ok(false);
        }
        self.sync.local().write(&store)?;
        info!("Removed script '{}'", name);

        self.opportunistic_sync()?;
        Ok(true)
    }

    pub fn get_script_info(&self, name: &str) -> Option<ScriptRecord> {
        self.lookup_script(name)
    }

    /// Lookup that turns a miss into `ScriptNotFound`.
    pub fn require_script(&self, name: &str) -> Result<ScriptRecord, ApiError> {
        self.lookup_script(name)
            .ok_or_else(|| ApiError::ScriptNotFound(name.to_string()))
    }

    pub fn sync_mapping(&mut self) -> Result<SyncStatus, ApiError> {
        self.sync.sync_mapping()
    }

    pub fn sync_from_remote(&mut self) -> Result<SyncStatus, ApiError> {
        self.sync.sync_from_remote()
    }

    fn opportunistic_sync(&mut self) -> Result<(), ApiError> {
        if !self.auto_sync || !self.sync.has_remote() {
            return Ok(());
        }
        if let SyncStatus::Failed(err) = self.sync.sync_mapping()? {
            debug!("Opportunistic sync skipped: {}", err);
        }
        Ok(())
    }
}

fn strip_reserved(name: &str, mut metadata: Metadata) -> Metadata {
    for key in RESERVED_KEYS {
        if metadata.remove(key).is_some() {
            warn!("Ignoring reserved metadata key '{}' for script '{}'", key, name);
        }
    }
    metadata
}
