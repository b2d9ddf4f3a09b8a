use crate::support::{memory, synchronizer, FailingBlobService};
use script_magic::remote::{BlobService, MIRROR_DESCRIPTION, MIRROR_FILE_NAME};
use script_magic::store::{LocalStore, RemoteIdFile};
use script_magic::sync::{BootstrapAction, Resolution, SyncState};
use script_magic::types::{MappingStore, ScriptEntry};
use std::sync::Arc;
use tempfile::TempDir;

fn store_with(name: &str, remote_id: &str) -> MappingStore {
    let mut store = MappingStore::new();
    store.upsert(
        name,
        ScriptEntry {
            remote_id: remote_id.to_string(),
            created_at: chrono::Utc::now(),
            metadata: Default::default(),
        },
    );
    store
}

#[test]
fn bootstrap_without_prior_state_creates_one_mirror() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut sync = synchronizer(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));

    let outcome = sync.setup(&Resolution::PullRemote).unwrap();

    assert!(outcome.github_ok);
    assert!(matches!(outcome.action, BootstrapAction::CreatedMirror { .. }));
    assert_eq!(remote.blob_count(), 1);
    let id = RemoteIdFile::in_dir(dir.path()).read().unwrap().unwrap();
    let local = LocalStore::in_dir(dir.path());
    assert!(std::fs::metadata(local.path()).unwrap().len() > 0);
    assert!(local.read().last_synced_at.is_some());
    assert_eq!(
        MappingStore::from_json(&remote.content_of(&id).unwrap()).unwrap(),
        local.read()
    );
    assert_eq!(sync.state(), SyncState::Ready);
}

#[test]
fn bootstrap_with_known_id_and_no_local_pulls_exactly() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let remote_store = store_with("hello", "g1");
    let id = remote.insert(
        MIRROR_FILE_NAME,
        &remote_store.to_json_pretty().unwrap(),
        MIRROR_DESCRIPTION,
    );
    RemoteIdFile::in_dir(dir.path()).write(&id).unwrap();

    let mut sync = synchronizer(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    let outcome = sync.setup(&Resolution::PushLocal).unwrap();

    assert_eq!(outcome.action, BootstrapAction::PulledKnown { remote_id: id });
    assert_eq!(LocalStore::in_dir(dir.path()).read(), remote_store);
    assert_eq!(remote.blob_count(), 1);
}

#[test]
fn bootstrap_discovers_marked_mirror() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    remote.insert("notes.md", "unrelated", "my notes");
    let id = remote.insert(
        MIRROR_FILE_NAME,
        &store_with("found", "g9").to_json_pretty().unwrap(),
        MIRROR_DESCRIPTION,
    );

    let mut sync = synchronizer(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    let outcome = sync.setup(&Resolution::PushLocal).unwrap();

    assert_eq!(
        outcome.action,
        BootstrapAction::PulledDiscovered {
            remote_id: id.clone()
        }
    );
    assert!(LocalStore::in_dir(dir.path()).read().contains("found"));
    assert_eq!(RemoteIdFile::in_dir(dir.path()).read().unwrap(), Some(id));
}

#[test]
fn bootstrap_conflict_prefer_local_overwrites_discovered_mirror() {
    let dir = TempDir::new().unwrap();
    LocalStore::in_dir(dir.path())
        .write(&store_with("mine", "g-local"))
        .unwrap();
    let remote = memory();
    let id = remote.insert(
        MIRROR_FILE_NAME,
        &store_with("theirs", "g-remote").to_json_pretty().unwrap(),
        MIRROR_DESCRIPTION,
    );

    let mut sync = synchronizer(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    sync.setup(&Resolution::PushLocal).unwrap();

    let mirrored = MappingStore::from_json(&remote.content_of(&id).unwrap()).unwrap();
    assert!(mirrored.contains("mine"));
    assert!(!mirrored.contains("theirs"));
    assert_eq!(mirrored, LocalStore::in_dir(dir.path()).read());
}

#[test]
fn bootstrap_with_unreachable_remote_runs_locally() {
    let dir = TempDir::new().unwrap();
    let mut sync = synchronizer(dir.path(), Some(Arc::new(FailingBlobService)));

    let outcome = sync.setup(&Resolution::PullRemote).unwrap();

    assert!(!outcome.github_ok);
    assert!(matches!(outcome.action, BootstrapAction::LocalOnly { .. }));
    assert!(LocalStore::in_dir(dir.path()).exists());
    assert!(!RemoteIdFile::in_dir(dir.path()).exists());
}

#[test]
fn corrupt_mirror_degrades_to_local() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let id = remote.insert(MIRROR_FILE_NAME, "{ not json", MIRROR_DESCRIPTION);
    RemoteIdFile::in_dir(dir.path()).write(&id).unwrap();

    let mut sync = synchronizer(dir.path(), Some(remote as Arc<dyn BlobService>));
    let outcome = sync.setup(&Resolution::PullRemote).unwrap();

    assert!(!outcome.github_ok);
    let status = sync.sync_from_remote().unwrap();
    assert!(!status.is_synced());
}
