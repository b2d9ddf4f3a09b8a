//! Per-script source cache.
//!
//! Not authoritative: a missing file always falls back to fetching the blob.

use super::write_atomic;
use crate::error::StorageError;
use std::path::{Path, PathBuf};

const SCRIPT_EXTENSION: &str = "py";

/// Cached script sources under `<data_dir>/scripts/`.
#[derive(Debug, Clone)]
pub struct ScriptCache {
    dir: PathBuf,
}

impl ScriptCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("scripts"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic cache path for a script name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", cache_stem(name), SCRIPT_EXTENSION))
    }

    pub fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    pub fn save(&self, name: &str, content: &str) -> Result<PathBuf, StorageError> {
        let path = self.path_for(name);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Drop the cached copy; false when there was none.
    pub fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

/// Names made of `[A-Za-z0-9_-]` are used as-is; anything else is sanitized and
/// suffixed with a short hash of the original so distinct names stay distinct.
fn cache_stem(name: &str) -> String {
    let safe = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if safe {
        return name.to_string();
    }
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = blake3::hash(name.as_bytes());
    format!("{}-{}", sanitized, &hex::encode(digest.as_bytes())[..8])
}
