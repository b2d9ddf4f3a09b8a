//! Persisted identifier of the remote mirror blob.

use super::write_atomic;
use crate::error::StorageError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the identifier file inside the data directory.
pub const REMOTE_ID_FILE_NAME: &str = "gist_id.txt";

/// One-line text file naming the blob that mirrors the whole mapping.
///
/// Absence (or an empty file) means no mirror has been established yet.
#[derive(Debug, Clone)]
pub struct RemoteIdFile {
    path: PathBuf,
}

impl RemoteIdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(REMOTE_ID_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    debug!("Loaded mapping remote id: {}", id);
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    pub fn write(&self, id: &str) -> Result<(), StorageError> {
        write_atomic(&self.path, format!("{}\n", id.trim()).as_bytes())?;
        debug!("Saved mapping remote id: {}", id);
        Ok(())
    }
}
