//! Interrupted runs pick up where they stopped.

use super::support::{self, FakeConcatenator, FakeService, IMAGE, VIDEO};
use reelsmith::error::PipelineError;
use reelsmith::executor::RunOutcome;
use reelsmith::record::RunInputs;
use reelsmith::store::{ArtifactStore, MemoryArtifactStore, RunLayout};
use std::sync::Arc;

fn inputs() -> RunInputs {
    RunInputs::new("A lighthouse keeper befriends a storm", "", "ink wash")
}

#[tokio::test]
async fn failed_run_resumes_without_repeating_work() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let engine = support::engine(&service, store.clone(), &concat, true);

    service.fail_on(VIDEO);
    let err = engine.run(inputs()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ProviderError(_)));
    assert!(err.is_transport());

    let text_calls = service.total_calls() - service.calls(IMAGE) - service.calls(VIDEO);
    let images = service.calls(IMAGE);
    let failed_videos = service.calls(VIDEO);
    assert_eq!(concat.calls(), 0);

    service.recover();
    let outcome = engine.run(inputs()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let text_after = service.total_calls() - service.calls(IMAGE) - service.calls(VIDEO);
    assert_eq!(text_after, text_calls, "no text unit of work ran twice");
    assert_eq!(service.calls(IMAGE), images, "no frame was rendered twice");
    assert_eq!(service.calls(VIDEO), failed_videos + 4);
    assert_eq!(concat.calls(), 1);
}

#[tokio::test]
async fn existing_final_cut_skips_assembly() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let layout = RunLayout::new(&inputs().run_id()).unwrap();
    let final_key = layout.final_cut().unwrap();
    store.write(&final_key, b"cut:1").unwrap();

    let outcome = support::engine(&service, store.clone(), &concat, true)
        .run(inputs())
        .await
        .unwrap();
    let RunOutcome::Completed { final_cut, .. } = outcome else {
        panic!("expected completion");
    };

    assert_eq!(final_cut, final_key);
    assert_eq!(concat.calls(), 0);
    assert_eq!(store.read(&final_key).unwrap().unwrap(), b"cut:1".to_vec());
}

#[tokio::test]
async fn different_inputs_are_different_runs() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let engine = support::engine(&service, store.clone(), &concat, true);

    engine.run(inputs()).await.unwrap();
    let calls = service.calls("story");
    engine
        .run(RunInputs::new("A lighthouse keeper befriends a storm", "", "oil paint"))
        .await
        .unwrap();
    assert_eq!(service.calls("story"), calls + 1);
    assert_eq!(concat.calls(), 2);
}
