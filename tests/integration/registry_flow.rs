use crate::support::{memory, registry, FailingBlobService};
use script_magic::remote::BlobService;
use script_magic::sync::{Resolution, SyncStatus};
use script_magic::types::{MappingStore, Metadata};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn described(text: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("description".to_string(), json!(text));
    metadata
}

#[test]
fn add_lookup_remove_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut registry = registry(dir.path(), None);
    registry
        .synchronizer_mut()
        .setup(&Resolution::PullRemote)
        .unwrap();

    registry.add_script("alpha", "gistXYZ", described("demo")).unwrap();
    let record = registry.lookup_script("alpha").unwrap();
    assert_eq!(record.remote_id, "gistXYZ");
    assert_eq!(record.metadata["description"], json!("demo"));

    assert!(registry.remove_script("alpha").unwrap());
    assert!(registry.list_scripts().is_empty());
}

#[test]
fn mutations_are_mirrored_when_remote_is_up() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut registry = registry(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    registry
        .synchronizer_mut()
        .setup(&Resolution::PullRemote)
        .unwrap();
    let mirror_id = registry.synchronizer().remote_id().unwrap().to_string();

    registry.add_script("a", "first", Metadata::new()).unwrap();
    registry.add_script("a", "second", Metadata::new()).unwrap();
    registry.add_script("b", "other", Metadata::new()).unwrap();
    assert!(!registry.remove_script("missing").unwrap());
    assert!(registry.remove_script("b").unwrap());

    let mirrored = MappingStore::from_json(&remote.content_of(&mirror_id).unwrap()).unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored.get("a").unwrap().remote_id, "second");
    assert_eq!(remote.blob_count(), 1);
}

#[test]
fn failing_remote_never_blocks_local_operations() {
    let dir = TempDir::new().unwrap();
    let mut registry = registry(dir.path(), Some(Arc::new(FailingBlobService)));
    registry
        .synchronizer_mut()
        .setup(&Resolution::PullRemote)
        .unwrap();

    registry.add_script("alpha", "g1", described("demo")).unwrap();
    for _ in 0..3 {
        let status = registry.sync_mapping().unwrap();
        assert!(matches!(status, SyncStatus::Failed(_)));
    }
    assert_eq!(registry.list_scripts().len(), 1);
    assert_eq!(registry.lookup_script("alpha").unwrap().remote_id, "g1");
    assert!(registry.remove_script("alpha").unwrap());
    assert!(registry.lookup_script("alpha").is_none());
}

#[test]
fn remote_outage_then_recovery_pushes_local_state() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut registry = registry(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    registry
        .synchronizer_mut()
        .setup(&Resolution::PullRemote)
        .unwrap();
    let mirror_id = registry.synchronizer().remote_id().unwrap().to_string();

    remote.set_offline(true);
    registry.add_script("offline", "g2", Metadata::new()).unwrap();
    let stale = MappingStore::from_json(&remote.content_of(&mirror_id).unwrap()).unwrap();
    assert!(!stale.contains("offline"));

    remote.set_offline(false);
    assert!(registry.sync_mapping().unwrap().is_synced());
    let fresh = MappingStore::from_json(&remote.content_of(&mirror_id).unwrap()).unwrap();
    assert!(fresh.contains("offline"));
}

#[test]
fn pull_replaces_local_changes() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut registry = registry(dir.path(), Some(remote.clone() as Arc<dyn BlobService>));
    registry
        .synchronizer_mut()
        .setup(&Resolution::PullRemote)
        .unwrap();
    registry.add_script("kept", "g1", Metadata::new()).unwrap();

    remote.set_offline(true);
    registry.add_script("local-only", "g2", Metadata::new()).unwrap();
    remote.set_offline(false);

    assert!(registry.sync_from_remote().unwrap().is_synced());
    assert!(registry.lookup_script("kept").is_some());
    assert!(registry.lookup_script("local-only").is_none());
}
