//! Local mapping store.
//!
//! Durable read/write of the `MappingStore` to a single JSON file. Reads never fail:
//! a missing or unparsable file yields an empty store. Writes replace the file
//! atomically (temp file in the same directory, then rename).

pub mod cache;
pub mod identifier;

pub use cache::ScriptCache;
pub use identifier::RemoteIdFile;

use crate::error::StorageError;
use crate::types::MappingStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the mapping store inside the data directory.
pub const MAPPING_FILE_NAME: &str = "mapping.json";

/// JSON file holding the local mapping.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/mapping.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(MAPPING_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parse the store file. Missing, unreadable or malformed content gives an empty store.
    pub fn read(&self) -> MappingStore {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Mapping file not found at {}", self.path.display());
                return MappingStore::new();
            }
            Err(e) => {
                warn!("Failed to read mapping file {}: {}", self.path.display(), e);
                return MappingStore::new();
            }
        };

        match MappingStore::from_json(&content) {
            Ok(store) => {
                debug!(
                    "Loaded {} scripts from {}",
                    store.len(),
                    self.path.display()
                );
                store
            }
            Err(e) => {
                warn!(
                    "Invalid mapping file {} ({}); using an empty store",
                    self.path.display(),
                    e
                );
                MappingStore::new()
            }
        }
    }

    /// Serialize deterministically and atomically replace the file.
    pub fn write(&self, store: &MappingStore) -> Result<(), StorageError> {
        let content = store.to_json_pretty()?;
        write_atomic(&self.path, content.as_bytes())?;
        debug!("Wrote {} scripts to {}", store.len(), self.path.display());
        Ok(())
    }

    /// Create the containing directory and an empty store file if missing.
    ///
    /// Returns true when the file was created by this call.
    pub fn ensure_exists(&self) -> Result<bool, StorageError> {
        if self.exists() {
            return Ok(false);
        }
        info!("Creating new empty mapping file: {}", self.path.display());
        self.write(&MappingStore::new())?;
        Ok(true)
    }
}

/// Write `bytes` to `path` through a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| StorageError::io(&parent, e))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(&parent).map_err(|e| StorageError::io(&parent, e))?;
    temp.write_all(bytes)
        .map_err(|e| StorageError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StorageError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| StorageError::AtomicReplace {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}
