//! Whatever the service proposes, an accepted camera tree is a forest rooted at
//! the first camera.

use proptest::prelude::*;
use reelsmith::camera_tree::{attach_parents, group_cameras, path_to_root, CameraTreeResponse, ParentProposal};
use reelsmith::record::{ShotDescription, VariationType};
use reelsmith::types::ArtifactKey;

fn shot(index: usize, camera_index: usize) -> ShotDescription {
    ShotDescription {
        index,
        camera_index,
        first_frame: format!("shot {index}"),
        last_frame: String::new(),
        motion: String::new(),
        audio: String::new(),
        variation: VariationType::Small,
        first_frame_characters: Vec::new(),
        last_frame_characters: Vec::new(),
    }
}

fn key() -> ArtifactKey {
    ArtifactKey::parse("run/scene_0/camera_tree.json").unwrap()
}

proptest! {
    #[test]
    fn grouping_keeps_every_shot_once_and_in_order(cams in prop::collection::vec(0usize..5, 1..12)) {
        let shots: Vec<ShotDescription> = cams.iter().enumerate().map(|(i, &c)| shot(i, c)).collect();
        let cameras = group_cameras(&shots);

        let mut all: Vec<usize> = cameras.iter().flat_map(|c| c.shot_indices.clone()).collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..shots.len()).collect::<Vec<_>>());

        for camera in &cameras {
            prop_assert!(camera.shot_indices.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(camera.shot_indices.iter().all(|&s| cams[s] == camera.index));
        }
        // cameras appear in the order their first shot does
        prop_assert!(cameras.windows(2).all(|w| w[0].first_shot() < w[1].first_shot()));
    }

    #[test]
    fn accepted_trees_are_acyclic(
        cams in prop::collection::vec(0usize..4, 1..10),
        proposals in prop::collection::vec(
            prop::option::of((0usize..5, 0usize..12)),
            0..6,
        ),
    ) {
        let shots: Vec<ShotDescription> = cams.iter().enumerate().map(|(i, &c)| shot(i, c)).collect();
        let cameras = group_cameras(&shots);
        let response = CameraTreeResponse {
            camera_parent_items: proposals
                .iter()
                .map(|p| p.map(|(parent, anchor)| ParentProposal {
                    parent_cam_idx: Some(parent),
                    parent_shot_idx: Some(anchor),
                    reason: String::new(),
                    is_parent_fully_covers_child: None,
                    missing_info: None,
                }))
                .collect(),
        };

        if let Ok(tree) = attach_parents(&key(), cameras.clone(), response) {
            prop_assert!(tree[0].parent.is_none());
            let root = tree[0].index;
            for camera in &tree {
                let path = path_to_root(&tree, camera.index);
                prop_assert!(path.is_some(), "camera {} never reaches the root", camera.index);
                let path = path.unwrap();
                prop_assert_eq!(*path.last().unwrap(), root);
                prop_assert!(path.len() <= tree.len());
                if let Some(parent) = &camera.parent {
                    let owner = tree.iter().find(|c| c.index == parent.camera_index).unwrap();
                    prop_assert!(owner.shot_indices.contains(&parent.shot_index));
                }
            }
        }
    }

    #[test]
    fn well_formed_chain_is_always_accepted(cams in prop::collection::vec(0usize..4, 1..10)) {
        let shots: Vec<ShotDescription> = cams.iter().enumerate().map(|(i, &c)| shot(i, c)).collect();
        let cameras = group_cameras(&shots);
        // every camera hangs off the one before it, anchored on that camera's first shot
        let items = cameras
            .iter()
            .enumerate()
            .map(|(position, _)| {
                (position > 0).then(|| ParentProposal {
                    parent_cam_idx: Some(cameras[position - 1].index),
                    parent_shot_idx: Some(cameras[position - 1].first_shot()),
                    reason: "previous camera".to_string(),
                    is_parent_fully_covers_child: Some(false),
                    missing_info: None,
                })
            })
            .collect();
        let tree = attach_parents(&key(), cameras.clone(), CameraTreeResponse { camera_parent_items: items });
        prop_assert!(tree.is_ok());
    }
}
