//! Mapping Synchronizer
//!
//! Reconciliation policy between the local store and the remote mirror. There is
//! no merge: whichever side is read last during a push or pull replaces the other.
//!
//! Lifecycle per process: `Uninitialized -> Bootstrapped -> Ready`. Once `setup`
//! has run, no operation blocks on or fails because of the remote; remote trouble
//! is reported as a `SyncStatus::Failed` value and the local store stays
//! authoritative.

pub mod conflict;

pub use conflict::{ConflictPolicy, ConflictResolver, Resolution};

use crate::error::{ApiError, RemoteError};
use crate::remote::RemoteMirror;
use crate::store::{LocalStore, RemoteIdFile};
use crate::types::MappingStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Synchronizer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    /// Bootstrap decision taken, network step pending.
    Bootstrapped,
    Ready,
}

/// What bootstrap did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BootstrapAction {
    /// Local store and identifier already present; nothing fetched.
    TrustedLocal,
    /// A discovered mirror replaced (or populated) the local store.
    PulledDiscovered { remote_id: String },
    /// The local store overwrote a discovered mirror.
    PushedLocalOverDiscovered { remote_id: String },
    /// No mirror existed; a new one was created from the local store.
    CreatedMirror { remote_id: String },
    /// Identifier was known but the local store was missing; pulled it.
    PulledKnown { remote_id: String },
    /// Running on the local store only.
    LocalOnly { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapOutcome {
    pub github_ok: bool,
    #[serde(flatten)]
    pub action: BootstrapAction,
}

/// Result of an explicit or opportunistic sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced { remote_id: String },
    Failed(RemoteError),
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced { .. })
    }
}

/// Orchestrates the local store, the identifier file and the remote mirror.
pub struct Synchronizer {
    local: LocalStore,
    id_file: RemoteIdFile,
    remote: Option<Arc<dyn RemoteMirror>>,
    remote_id: Option<String>,
    state: SyncState,
    outcome: Option<BootstrapOutcome>,
}

impl Synchronizer {
    /// Create a synchronizer; `remote` is `None` when no remote is configured.
    pub fn new(
        local: LocalStore,
        id_file: RemoteIdFile,
        remote: Option<Arc<dyn RemoteMirror>>,
    ) -> Result<Self, ApiError> {
        let remote_id = id_file.read()?;
        Ok(Self {
            local,
            id_file,
            remote,
            remote_id,
            state: SyncState::Uninitialized,
            outcome: None,
        })
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn outcome(&self) -> Option<&BootstrapOutcome> {
        self.outcome.as_ref()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Best-effort bootstrap, run once at startup.
    ///
    /// Returns an error only for local storage failures or when the conflict
    /// resolver refuses (e.g. an interrupted prompt); in the latter case nothing
    /// has been written. Repeated calls return the first outcome.
    pub fn setup(&mut self, resolver: &dyn ConflictResolver) -> Result<BootstrapOutcome, ApiError> {
        if let Some(outcome) = &self.outcome {
            return Ok(outcome.clone());
        }

        let local_exists = self.local.exists();
        self.state = SyncState::Bootstrapped;

        let outcome = match self.remote.clone() {
            None => {
                if self.remote_id.is_none() {
                    self.local.ensure_exists()?;
                }
                BootstrapOutcome {
                    github_ok: false,
                    action: BootstrapAction::LocalOnly {
                        reason: RemoteError::NotConfigured.to_string(),
                    },
                }
            }
            Some(_) if local_exists && self.remote_id.is_some() => {
                debug!("Mapping file and remote id already exist");
                BootstrapOutcome {
                    github_ok: true,
                    action: BootstrapAction::TrustedLocal,
                }
            }
            Some(remote) => {
                let attempt = match self.remote_id.clone() {
                    None => self.bootstrap_unlinked(remote.as_ref(), local_exists, resolver),
                    Some(id) => self.pull_into_local(remote.as_ref(), &id).map(|_| {
                        BootstrapAction::PulledKnown { remote_id: id }
                    }),
                };
                match attempt {
                    Ok(action) => BootstrapOutcome {
                        github_ok: true,
                        action,
                    },
                    Err(ApiError::Remote(e)) => {
                        log_remote_failure("bootstrap", &e);
                        // With a known identifier the missing local copy is left
                        // absent so the next start retries the pull.
                        if self.remote_id.is_none() {
                            self.local.ensure_exists()?;
                        }
                        BootstrapOutcome {
                            github_ok: false,
                            action: BootstrapAction::LocalOnly {
                                reason: e.to_string(),
                            },
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
        };

        info!("Mapping bootstrap finished: {:?}", outcome);
        self.state = SyncState::Ready;
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// No identifier persisted yet: adopt a discovered mirror or create one.
    fn bootstrap_unlinked(
        &mut self,
        remote: &dyn RemoteMirror,
        local_exists: bool,
        resolver: &dyn ConflictResolver,
    ) -> Result<BootstrapAction, ApiError> {
        match remote.discover()? {
            Some(found) => {
                info!("Found existing mapping mirror: {}", found);
                let resolution = if local_exists {
                    resolver.resolve(true, true)?
                } else {
                    Resolution::PullRemote
                };
                match resolution {
                    Resolution::PullRemote => {
                        self.pull_into_local(remote, &found)?;
                        self.persist_remote_id(&found)?;
                        Ok(BootstrapAction::PulledDiscovered { remote_id: found })
                    }
                    Resolution::PushLocal => {
                        let remote_id = self.push_local(remote, Some(&found))?;
                        Ok(BootstrapAction::PushedLocalOverDiscovered { remote_id })
                    }
                }
            }
            None => {
                info!("No existing mapping mirror found, creating one");
                self.local.ensure_exists()?;
                let remote_id = self.push_local(remote, None)?;
                Ok(BootstrapAction::CreatedMirror { remote_id })
            }
        }
    }

    /// Push the current local store, stamping `lastSyncedAt`.
    ///
    /// The stamped snapshot is written locally only after the upload succeeded,
    /// so both copies hold the same store.
    fn push_local(
        &mut self,
        remote: &dyn RemoteMirror,
        existing_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut snapshot = self.local.read();
        snapshot.last_synced_at = Some(Utc::now());
        let remote_id = remote.push(&snapshot, existing_id)?;
        if self.remote_id.as_deref() != Some(remote_id.as_str()) {
            self.persist_remote_id(&remote_id)?;
        }
        self.local.write(&snapshot)?;
        Ok(remote_id)
    }

    /// Replace the local store wholesale with the mirror at `id`.
    fn pull_into_local(&mut self, remote: &dyn RemoteMirror, id: &str) -> Result<MappingStore, ApiError> {
        let store = remote.pull(id)?;
        self.local.write(&store)?;
        info!("Synced mapping from remote mirror {}", id);
        Ok(store)
    }

    fn persist_remote_id(&mut self, id: &str) -> Result<(), ApiError> {
        self.id_file.write(id)?;
        self.remote_id = Some(id.to_string());
        Ok(())
    }

    /// Push the local store to the mirror, creating the mirror on first success.
    ///
    /// Remote failures come back as `SyncStatus::Failed` with the local store
    /// untouched; only local storage failures are errors.
    pub fn sync_mapping(&mut self) -> Result<SyncStatus, ApiError> {
        let Some(remote) = self.remote.clone() else {
            return Ok(SyncStatus::Failed(RemoteError::NotConfigured));
        };
        let existing = self.remote_id.clone();
        match self.push_local(remote.as_ref(), existing.as_deref()) {
            Ok(remote_id) => {
                info!("Mapping synced to remote mirror {}", remote_id);
                Ok(SyncStatus::Synced { remote_id })
            }
            Err(ApiError::Remote(e)) => {
                log_remote_failure("sync", &e);
                Ok(SyncStatus::Failed(e))
            }
            Err(other) => Err(other),
        }
    }

    /// Overwrite the local store with the mirror. Requires a known identifier.
    pub fn sync_from_remote(&mut self) -> Result<SyncStatus, ApiError> {
        let Some(remote) = self.remote.clone() else {
            return Ok(SyncStatus::Failed(RemoteError::NotConfigured));
        };
        let Some(remote_id) = self.remote_id.clone() else {
            warn!("No remote id available for mapping pull");
            return Ok(SyncStatus::Failed(RemoteError::NotLinked));
        };
        match self.pull_into_local(remote.as_ref(), &remote_id) {
            Ok(_) => Ok(SyncStatus::Synced { remote_id }),
            Err(ApiError::Remote(e)) => {
                log_remote_failure("pull", &e);
                Ok(SyncStatus::Failed(e))
            }
            Err(other) => Err(other),
        }
    }
}

fn log_remote_failure(operation: &str, err: &RemoteError) {
    if err.is_corrupt() {
        error!("Mapping {} failed, remote content is corrupt: {}", operation, err);
    } else {
        warn!("Mapping {} failed, continuing with local mapping: {}", operation, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScriptEntry;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted mirror that records calls.
    #[derive(Default)]
    struct FakeMirror {
        blobs: Mutex<std::collections::BTreeMap<String, MappingStore>>,
        discovered: Option<String>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeMirror {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteMirror for FakeMirror {
        fn push(&self, store: &MappingStore, existing_id: Option<&str>) -> Result<String, RemoteError> {
            self.calls.lock().unwrap().push("push".to_string());
            if self.fail {
                return Err(RemoteError::Unavailable("down".to_string()));
            }
            let mut blobs = self.blobs.lock().unwrap();
            let id = existing_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("mirror-{}", blobs.len() + 1));
            blobs.insert(id.clone(), store.clone());
            Ok(id)
        }

        fn pull(&self, id: &str) -> Result<MappingStore, RemoteError> {
            self.calls.lock().unwrap().push("pull".to_string());
            if self.fail {
                return Err(RemoteError::Unavailable("down".to_string()));
            }
            self.blobs
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))
        }

        fn discover(&self) -> Result<Option<String>, RemoteError> {
            self.calls.lock().unwrap().push("discover".to_string());
            if self.fail {
                return Err(RemoteError::Unavailable("down".to_string()));
            }
            Ok(self.discovered.clone())
        }
    }

    struct Refuse;

    impl ConflictResolver for Refuse {
        fn resolve(&self, _: bool, _: bool) -> Result<Resolution, ApiError> {
            Err(ApiError::Interrupted("prompt cancelled".to_string()))
        }
    }

    fn remote_store() -> MappingStore {
        let mut store = MappingStore::new();
        store.upsert(
            "remote-script",
            ScriptEntry {
                remote_id: "g-remote".to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
                metadata: Default::default(),
            },
        );
        store
    }

    fn local_store() -> MappingStore {
        let mut store = MappingStore::new();
        store.upsert(
            "local-script",
            ScriptEntry {
                remote_id: "g-local".to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap(),
                metadata: Default::default(),
            },
        );
        store
    }

    fn synchronizer(dir: &TempDir, mirror: Option<Arc<FakeMirror>>) -> Synchronizer {
        Synchronizer::new(
            LocalStore::in_dir(dir.path()),
            RemoteIdFile::in_dir(dir.path()),
            mirror.map(|m| m as Arc<dyn RemoteMirror>),
        )
        .unwrap()
    }

    #[test]
    fn test_setup_trusts_existing_state_without_network() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        RemoteIdFile::in_dir(dir.path()).write("known").unwrap();
        let mirror = Arc::new(FakeMirror::default());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let outcome = sync.setup(&Resolution::PullRemote).unwrap();
        assert!(outcome.github_ok);
        assert_eq!(outcome.action, BootstrapAction::TrustedLocal);
        assert!(mirror.calls().is_empty());
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[test]
    fn test_setup_from_nothing_creates_mirror() {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(FakeMirror::default());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let outcome = sync.setup(&Resolution::PullRemote).unwrap();
        assert!(outcome.github_ok);
        assert!(matches!(outcome.action, BootstrapAction::CreatedMirror { .. }));
        assert_eq!(mirror.blobs.lock().unwrap().len(), 1);
        assert!(sync.remote_id().is_some());
        let local = sync.local().read();
        assert!(local.last_synced_at.is_some());
        assert!(sync.local().exists());
        assert_eq!(
            RemoteIdFile::in_dir(dir.path()).read().unwrap().as_deref(),
            sync.remote_id()
        );
    }

    #[test]
    fn test_setup_pulls_discovered_mirror_when_no_local() {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(FakeMirror {
            discovered: Some("found".to_string()),
            ..Default::default()
        });
        mirror
            .blobs
            .lock()
            .unwrap()
            .insert("found".to_string(), remote_store());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let outcome = sync.setup(&Refuse).unwrap();
        assert_eq!(
            outcome.action,
            BootstrapAction::PulledDiscovered {
                remote_id: "found".to_string()
            }
        );
        assert_eq!(sync.local().read(), remote_store());
        assert_eq!(sync.remote_id(), Some("found"));
    }

    #[test]
    fn test_conflict_prefer_local_overwrites_remote() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        let mirror = Arc::new(FakeMirror {
            discovered: Some("found".to_string()),
            ..Default::default()
        });
        mirror
            .blobs
            .lock()
            .unwrap()
            .insert("found".to_string(), remote_store());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let outcome = sync.setup(&Resolution::PushLocal).unwrap();
        assert_eq!(
            outcome.action,
            BootstrapAction::PushedLocalOverDiscovered {
                remote_id: "found".to_string()
            }
        );
        let pushed = mirror.blobs.lock().unwrap().get("found").cloned().unwrap();
        assert!(pushed.contains("local-script"));
        assert!(!pushed.contains("remote-script"));
        assert_eq!(pushed, sync.local().read());
        assert!(!mirror.calls().contains(&"pull".to_string()));
    }

    #[test]
    fn test_conflict_prefer_remote_overwrites_local() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        let mirror = Arc::new(FakeMirror {
            discovered: Some("found".to_string()),
            ..Default::default()
        });
        mirror
            .blobs
            .lock()
            .unwrap()
            .insert("found".to_string(), remote_store());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        sync.setup(&Resolution::PullRemote).unwrap();
        assert_eq!(sync.local().read(), remote_store());
        assert!(!mirror.calls().contains(&"push".to_string()));
    }

    #[test]
    fn test_refused_conflict_writes_nothing() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        let before = std::fs::read_to_string(LocalStore::in_dir(dir.path()).path()).unwrap();
        let mirror = Arc::new(FakeMirror {
            discovered: Some("found".to_string()),
            ..Default::default()
        });
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let err = sync.setup(&Refuse).unwrap_err();
        assert!(matches!(err, ApiError::Interrupted(_)));
        let after = std::fs::read_to_string(sync.local().path()).unwrap();
        assert_eq!(before, after);
        assert!(!RemoteIdFile::in_dir(dir.path()).exists());
        assert_eq!(mirror.calls(), vec!["discover".to_string()]);
    }

    #[test]
    fn test_setup_pulls_known_mirror_when_local_missing() {
        let dir = TempDir::new().unwrap();
        RemoteIdFile::in_dir(dir.path()).write("known").unwrap();
        let mirror = Arc::new(FakeMirror::default());
        mirror
            .blobs
            .lock()
            .unwrap()
            .insert("known".to_string(), remote_store());
        let mut sync = synchronizer(&dir, Some(mirror));

        let outcome = sync.setup(&Refuse).unwrap();
        assert_eq!(
            outcome.action,
            BootstrapAction::PulledKnown {
                remote_id: "known".to_string()
            }
        );
        assert_eq!(sync.local().read(), remote_store());
    }

    #[test]
    fn test_setup_degrades_when_remote_down() {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(FakeMirror {
            fail: true,
            ..Default::default()
        });
        let mut sync = synchronizer(&dir, Some(mirror));

        let outcome = sync.setup(&Resolution::PullRemote).unwrap();
        assert!(!outcome.github_ok);
        assert!(matches!(outcome.action, BootstrapAction::LocalOnly { .. }));
        assert!(sync.local().exists());
        assert!(sync.remote_id().is_none());
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[test]
    fn test_failed_pull_of_known_mirror_keeps_local_absent() {
        let dir = TempDir::new().unwrap();
        RemoteIdFile::in_dir(dir.path()).write("known").unwrap();
        let mirror = Arc::new(FakeMirror {
            fail: true,
            ..Default::default()
        });
        let mut sync = synchronizer(&dir, Some(mirror));

        let outcome = sync.setup(&Resolution::PullRemote).unwrap();
        assert!(!outcome.github_ok);
        assert!(!sync.local().exists());
    }

    #[test]
    fn test_setup_without_remote_is_local_only() {
        let dir = TempDir::new().unwrap();
        let mut sync = synchronizer(&dir, None);
        let outcome = sync.setup(&Resolution::PullRemote).unwrap();
        assert!(!outcome.github_ok);
        assert!(sync.local().exists());
        assert_eq!(
            sync.sync_mapping().unwrap(),
            SyncStatus::Failed(RemoteError::NotConfigured)
        );
    }

    #[test]
    fn test_setup_runs_once() {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(FakeMirror::default());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));
        let first = sync.setup(&Resolution::PullRemote).unwrap();
        let calls = mirror.calls().len();
        let second = sync.setup(&Resolution::PushLocal).unwrap();
        assert_eq!(first, second);
        assert_eq!(mirror.calls().len(), calls);
    }

    #[test]
    fn test_sync_mapping_failure_leaves_local_untouched() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        let mirror = Arc::new(FakeMirror {
            fail: true,
            ..Default::default()
        });
        let mut sync = synchronizer(&dir, Some(mirror));
        let before = sync.local().read();

        for _ in 0..3 {
            let status = sync.sync_mapping().unwrap();
            assert!(!status.is_synced());
        }
        assert_eq!(sync.local().read(), before);
        assert!(sync.local().read().last_synced_at.is_none());
    }

    #[test]
    fn test_sync_mapping_mints_identifier_then_reuses_it() {
        let dir = TempDir::new().unwrap();
        let mirror = Arc::new(FakeMirror::default());
        let mut sync = synchronizer(&dir, Some(mirror.clone()));

        let first = sync.sync_mapping().unwrap();
        let SyncStatus::Synced { remote_id } = first else {
            panic!("expected sync to succeed");
        };
        let second = sync.sync_mapping().unwrap();
        assert_eq!(second, SyncStatus::Synced { remote_id: remote_id.clone() });
        assert_eq!(mirror.blobs.lock().unwrap().len(), 1);
        assert_eq!(
            RemoteIdFile::in_dir(dir.path()).read().unwrap(),
            Some(remote_id)
        );
    }

    #[test]
    fn test_sync_from_remote_requires_identifier() {
        let dir = TempDir::new().unwrap();
        let mut sync = synchronizer(&dir, Some(Arc::new(FakeMirror::default())));
        assert_eq!(
            sync.sync_from_remote().unwrap(),
            SyncStatus::Failed(RemoteError::NotLinked)
        );
    }

    #[test]
    fn test_sync_from_remote_replaces_local() {
        let dir = TempDir::new().unwrap();
        LocalStore::in_dir(dir.path()).write(&local_store()).unwrap();
        RemoteIdFile::in_dir(dir.path()).write("known").unwrap();
        let mirror = Arc::new(FakeMirror::default());
        mirror
            .blobs
            .lock()
            .unwrap()
            .insert("known".to_string(), remote_store());
        let mut sync = synchronizer(&dir, Some(mirror));

        assert!(sync.sync_from_remote().unwrap().is_synced());
        assert_eq!(sync.local().read(), remote_store());
    }
}
