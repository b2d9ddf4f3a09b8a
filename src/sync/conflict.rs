//! Bootstrap conflict resolution.
//!
//! When a local mapping exists and an unrelated mirror is discovered remotely,
//! exactly one side must win. The decision is injected so the synchronizer never
//! touches a terminal itself.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// Which side replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the local store with the remote mirror.
    PullRemote,
    /// Overwrite the remote mirror with the local store.
    PushLocal,
}

/// Decides a bootstrap conflict.
pub trait ConflictResolver {
    /// An error aborts bootstrap before anything is written.
    fn resolve(&self, local_exists: bool, remote_exists: bool) -> Result<Resolution, ApiError>;
}

/// A fixed answer.
impl ConflictResolver for Resolution {
    fn resolve(&self, _local_exists: bool, _remote_exists: bool) -> Result<Resolution, ApiError> {
        Ok(*self)
    }
}

/// Configured conflict policy (`sync.conflict_policy`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Ask on a terminal; falls back to `PreferRemote` when none is attached.
    #[default]
    Prompt,
    PreferRemote,
    PreferLocal,
}

impl ConflictPolicy {
    /// The deterministic resolution, or `None` when the user must be asked.
    pub fn fixed(self) -> Option<Resolution> {
        match self {
            ConflictPolicy::Prompt => None,
            ConflictPolicy::PreferRemote => Some(Resolution::PullRemote),
            ConflictPolicy::PreferLocal => Some(Resolution::PushLocal),
        }
    }

    /// Answer used when prompting is impossible.
    pub fn non_interactive(self) -> Resolution {
        self.fixed().unwrap_or(Resolution::PullRemote)
    }
}
