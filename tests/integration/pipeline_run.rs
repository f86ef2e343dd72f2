//! End-to-end runs against the scripted service.

use super::support::{self, FakeConcatenator, FakeService, Scenario, CLIP_MS, IMAGE, LAST_FRAME_MS, VIDEO};
use reelsmith::config::PipelineSettings;
use reelsmith::executor::{PipelineEngine, RunOutcome};
use reelsmith::provider::GenerationTask;
use reelsmith::record::{FrameSlot, ProductionRecord, RunInputs};
use reelsmith::reference::ReferenceSelection;
use reelsmith::store::{ArtifactStore, MemoryArtifactStore, RunLayout};
use reelsmith::types::ArtifactKey;
use std::collections::HashSet;
use std::sync::Arc;

fn inputs() -> RunInputs {
    RunInputs::new(
        "A lighthouse keeper befriends a storm",
        "one scene, four shots",
        "ink wash",
    )
}

fn completed(outcome: RunOutcome) -> (ArtifactKey, ProductionRecord) {
    match outcome {
        RunOutcome::Completed { final_cut, record } => (final_cut, record),
        RunOutcome::Suspended { token, .. } => panic!("run {} suspended unexpectedly", token.run_id),
    }
}

#[tokio::test]
async fn full_run_produces_every_artifact() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let engine = support::engine(&service, store.clone(), &concat, true);

    let (final_cut, record) = completed(engine.run(inputs()).await.unwrap());

    assert_eq!(record.characters.len(), 2);
    assert_eq!(record.portraits.len(), 2);
    assert!(record.portraits.iter().all(|p| p.views.len() == 3));

    assert_eq!(record.scenes.len(), 1);
    let scene = &record.scenes[0];
    assert_eq!(scene.shots.len(), 4);
    assert_eq!(scene.cameras.len(), 2);
    assert_eq!(scene.cameras[0].shot_indices, vec![0, 2]);
    assert_eq!(scene.cameras[1].shot_indices, vec![1, 3]);
    assert!(scene.cameras[0].parent.is_none());
    let parent = scene.cameras[1].parent.as_ref().unwrap();
    assert_eq!(parent.camera_index, 0);
    assert_eq!(parent.shot_index, 0);

    let with_last: Vec<usize> = scene
        .frames
        .iter()
        .filter(|f| f.last.is_some())
        .map(|f| f.shot_index)
        .collect();
    assert_eq!(with_last, vec![2]);
    assert_eq!(scene.videos.len(), 4);

    let cut = store.read(&final_cut).unwrap().unwrap();
    assert_eq!(support::cut_duration(&cut), Some(4 * CLIP_MS + LAST_FRAME_MS));
    assert_eq!(concat.clip_counts(), vec![4]);

    assert_eq!(service.calls("story"), 1);
    assert_eq!(service.calls("shot_description"), 4);
    assert_eq!(service.calls("camera_tree"), 1);
    assert_eq!(service.calls("reference_select"), 5);
    assert_eq!(service.calls("reference_preselect"), 0);
    assert_eq!(service.calls(IMAGE), 6 + 5);
    assert_eq!(service.calls(VIDEO), 4);
}

#[tokio::test]
async fn frame_selections_stay_bounded_and_follow_the_camera_tree() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let engine = support::engine(&service, store.clone(), &concat, true);
    let (_, record) = completed(engine.run(inputs()).await.unwrap());
    let layout = RunLayout::new(&record.run_id).unwrap();

    for shot in 0..4 {
        for slot in [FrameSlot::First, FrameSlot::Last] {
            let key = layout.frame_selection(0, shot, slot).unwrap();
            let Some(bytes) = store.read(&key).unwrap() else {
                continue;
            };
            let selection: ReferenceSelection = serde_json::from_slice(&bytes).unwrap();
            assert!(selection.references.len() <= 3, "{key} kept too many references");
            let mut characters = HashSet::new();
            for reference in &selection.references {
                if let Some(character) = reference.character {
                    assert!(characters.insert(character), "{key} repeats a character");
                }
            }
        }
    }

    // camera 1 opens on shot 1, anchored to the first frame of shot 0
    let key = layout.frame_selection(0, 1, FrameSlot::First).unwrap();
    let selection: ReferenceSelection =
        serde_json::from_slice(&store.read(&key).unwrap().unwrap()).unwrap();
    let anchor = layout.frame(0, 0, FrameSlot::First).unwrap();
    assert!(selection.references.iter().any(|r| r.key == anchor));
    assert!(selection.image_prompt().starts_with("Image 0: "));

    // the last frame of a varied shot is conditioned on its own first frame
    let key = layout.frame_selection(0, 2, FrameSlot::Last).unwrap();
    let selection: ReferenceSelection =
        serde_json::from_slice(&store.read(&key).unwrap().unwrap()).unwrap();
    let own_first = layout.frame(0, 2, FrameSlot::First).unwrap();
    assert!(selection.references.iter().any(|r| r.key == own_first));

    let offered_anchor = service
        .requests(GenerationTask::ReferenceSelect)
        .into_iter()
        .filter(|r| r.text.contains("[Camera 1] scene 0 shot 1 opens"))
        .any(|r| r.text.contains("[Camera 0] scene 0 shot 0 opens"));
    assert!(offered_anchor);
}

#[tokio::test]
async fn second_run_is_served_entirely_from_the_store() {
    let store = Arc::new(MemoryArtifactStore::new());
    let first_service = FakeService::new();
    let first_concat = FakeConcatenator::new();
    let (first_cut, first_record) = completed(
        support::engine(&first_service, store.clone(), &first_concat, true)
            .run(inputs())
            .await
            .unwrap(),
    );
    let written = store.len();

    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let (cut, record) = completed(
        support::engine(&service, store.clone(), &concat, true)
            .run(inputs())
            .await
            .unwrap(),
    );

    assert_eq!(service.total_calls(), 0);
    assert_eq!(concat.calls(), 0);
    assert_eq!(store.len(), written);
    assert_eq!(cut, first_cut);
    assert_eq!(record, first_record);
}

#[tokio::test]
async fn single_camera_scene_needs_no_tree_proposal() {
    let service = FakeService::with_scenario(Scenario {
        scenes: vec![vec![0, 0]],
        varied_shots: vec![],
        characters: vec!["Mara"],
    });
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, true);
    let (_, record) = completed(engine.run(inputs()).await.unwrap());

    assert_eq!(service.calls("camera_tree"), 0);
    assert_eq!(record.scenes[0].cameras.len(), 1);
    assert_eq!(record.scenes[0].cameras[0].shot_indices, vec![0, 1]);
}

#[tokio::test]
async fn concurrent_units_produce_the_same_record() {
    let scenario = Scenario {
        scenes: vec![vec![0, 0, 1], vec![0, 1, 1, 2]],
        varied_shots: vec![(1, 3)],
        characters: vec!["Mara", "Old Tom"],
    };

    let mut results = Vec::new();
    for limit in [1, 4] {
        let service = FakeService::with_scenario(scenario.clone());
        let concat = FakeConcatenator::new();
        let store = Arc::new(MemoryArtifactStore::new());
        let engine = PipelineEngine::new(
            service.clone(),
            store.clone(),
            concat.clone(),
            PipelineSettings {
                max_concurrent_units: limit,
                auto_approve: true,
            },
        );
        let (cut, record) = completed(engine.run(inputs()).await.unwrap());
        let bytes = store.read(&cut).unwrap().unwrap();
        results.push((record, support::cut_duration(&bytes)));
    }

    let (sequential, parallel) = (&results[0], &results[1]);
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.0.shot_count(), 7);
    assert_eq!(sequential.1, Some(7 * CLIP_MS + LAST_FRAME_MS));
}

#[tokio::test]
async fn large_portrait_pools_go_through_both_selection_passes() {
    let service = FakeService::with_scenario(Scenario {
        characters: vec!["Mara", "Old Tom", "The Gull"],
        ..Scenario::default()
    });
    let concat = FakeConcatenator::new();
    let store = Arc::new(MemoryArtifactStore::new());
    let engine = support::engine(&service, store.clone(), &concat, true);

    let (final_cut, record) = completed(engine.run(inputs()).await.unwrap());
    assert!(store.exists(&final_cut).unwrap());
    assert_eq!(record.portraits.iter().map(|p| p.views.len()).sum::<usize>(), 9);

    // every first frame sees nine portraits; only the last frame of shot 2 has a small pool
    assert_eq!(service.calls("reference_preselect"), 4);
    assert_eq!(service.calls("reference_select"), 5);

    for request in service.requests(GenerationTask::ReferencePreselect) {
        assert_eq!(request.images, 0, "the first pass is text only");
    }
    for request in service.requests(GenerationTask::ReferenceSelect) {
        assert!(request.images <= 8, "final pass saw {} images", request.images);
    }

    let layout = RunLayout::new(&record.run_id).unwrap();
    let mut preselected = 0;
    for shot in 0..4 {
        let key = layout.frame_selection(0, shot, FrameSlot::First).unwrap();
        let selection: ReferenceSelection =
            serde_json::from_slice(&store.read(&key).unwrap().unwrap()).unwrap();
        assert!(selection.references.len() <= 3);
        let characters: HashSet<_> = selection.references.iter().filter_map(|r| r.character).collect();
        let portraits = selection.references.iter().filter(|r| r.character.is_some()).count();
        assert_eq!(characters.len(), portraits, "one view per character");
        preselected += usize::from(selection.preselected);
    }
    assert_eq!(preselected, 4);
}
