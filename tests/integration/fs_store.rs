//! Runs against the on-disk artifact store.

use super::support::{self, FakeConcatenator, FakeService, CLIP_MS, LAST_FRAME_MS};
use reelsmith::executor::RunOutcome;
use reelsmith::record::RunInputs;
use reelsmith::store::{ArtifactStore, FsArtifactStore, WriteOutcome};
use reelsmith::types::ArtifactKey;
use std::sync::Arc;
use tempfile::TempDir;

fn inputs() -> RunInputs {
    RunInputs::new("A lighthouse keeper befriends a storm", "", "charcoal")
}

#[tokio::test]
async fn run_survives_a_store_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("artifacts");

    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(FsArtifactStore::new(&root).unwrap());
    let outcome = support::engine(&service, store.clone(), &concat, true)
        .run(inputs())
        .await
        .unwrap();
    let RunOutcome::Completed { final_cut, record } = outcome else {
        panic!("expected completion");
    };

    let on_disk = store.path_of(&final_cut);
    assert!(on_disk.starts_with(&root));
    assert!(on_disk.ends_with("final_video.mp4"));
    let bytes = std::fs::read(&on_disk).unwrap();
    assert_eq!(support::cut_duration(&bytes), Some(4 * CLIP_MS + LAST_FRAME_MS));

    let portrait = &record.portraits[0].views[1].key;
    assert!(store.path_of(portrait).is_file());

    // a fresh process sees the same checkpoints
    let reopened = Arc::new(FsArtifactStore::new(&root).unwrap());
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let outcome = support::engine(&service, reopened, &concat, true)
        .run(inputs())
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(service.total_calls(), 0);
    assert_eq!(concat.calls(), 0);
}

#[test]
fn concurrent_writers_never_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsArtifactStore::new(temp_dir.path()).unwrap());
    let key = ArtifactKey::parse("run/scene_0/shot_0/video.mp4").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = key.clone();
            std::thread::spawn(move || store.write(&key, format!("clip:{i}").as_bytes()).unwrap())
        })
        .collect();
    let outcomes: Vec<WriteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let written = outcomes.iter().filter(|o| **o == WriteOutcome::Written).count();
    assert_eq!(written, 1);
    let stored = store.read(&key).unwrap().unwrap();
    assert!(support::clip_duration(&stored).is_some());

    // no temp files are left next to the artifact
    let dir = store.path_of(&key);
    let siblings = std::fs::read_dir(dir.parent().unwrap()).unwrap().count();
    assert_eq!(siblings, 1);
}
