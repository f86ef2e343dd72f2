//! Camera-Tree Builder
//!
//! Groups the shots of one scene into cameras and attaches each non-first camera
//! to a parent camera whose footage covers it. Parents must come earlier in camera
//! order, so walking parent pointers strictly decreases the position and always
//! ends at the first camera.

use crate::error::PipelineError;
use crate::record::{Camera, CameraParent, ShotDescription};
use crate::types::ArtifactKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw parent proposal as answered by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentProposal {
    pub parent_cam_idx: Option<usize>,
    pub parent_shot_idx: Option<usize>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub is_parent_fully_covers_child: Option<bool>,
    #[serde(default)]
    pub missing_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraTreeResponse {
    pub camera_parent_items: Vec<Option<ParentProposal>>,
}

/// Group shots by camera index. Cameras keep first-occurrence order, shots within
/// a camera are ascending.
pub fn group_cameras(shots: &[ShotDescription]) -> Vec<Camera> {
    let mut ordered = shots.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|shot| shot.index);

    let mut cameras: Vec<Camera> = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();
    for shot in ordered {
        match position.get(&shot.camera_index) {
            Some(&at) => cameras[at].shot_indices.push(shot.index),
            None => {
                position.insert(shot.camera_index, cameras.len());
                cameras.push(Camera::new(shot.camera_index, shot.index));
            }
        }
    }
    cameras
}

/// Merge a parent-proposal response into grouped cameras and validate the result.
pub fn attach_parents(
    key: &ArtifactKey,
    mut cameras: Vec<Camera>,
    response: CameraTreeResponse,
) -> Result<Vec<Camera>, PipelineError> {
    if response.camera_parent_items.len() != cameras.len() {
        return Err(PipelineError::consistency(
            key,
            format!(
                "expected {} parent proposals, got {}",
                cameras.len(),
                response.camera_parent_items.len()
            ),
        ));
    }

    for (camera, proposal) in cameras.iter_mut().zip(response.camera_parent_items) {
        camera.parent = match proposal {
            Some(ParentProposal {
                parent_cam_idx: Some(parent_camera),
                parent_shot_idx,
                reason,
                is_parent_fully_covers_child,
                missing_info,
            }) => {
                let shot_index = parent_shot_idx.ok_or_else(|| {
                    PipelineError::consistency(
                        key,
                        format!("camera {} names a parent without an anchoring shot", camera.index),
                    )
                })?;
                Some(CameraParent {
                    camera_index: parent_camera,
                    shot_index,
                    reason,
                    fully_covers_child: is_parent_fully_covers_child.unwrap_or(false),
                    missing_info,
                })
            }
            _ => None,
        };
    }

    validate_tree(key, &cameras)?;
    Ok(cameras)
}

/// Check the forest invariants: exactly one root (the first camera), every parent
/// earlier in order, every anchoring shot captured by its parent.
pub fn validate_tree(key: &ArtifactKey, cameras: &[Camera]) -> Result<(), PipelineError> {
    let Some(root) = cameras.first() else {
        return Err(PipelineError::consistency(key, "scene has no cameras"));
    };
    if root.parent.is_some() {
        return Err(PipelineError::consistency(
            key,
            format!("first camera {} must be the root", root.index),
        ));
    }

    let mut seen: HashMap<usize, &Camera> = HashMap::new();
    for (position, camera) in cameras.iter().enumerate() {
        if camera.shot_indices.is_empty() {
            return Err(PipelineError::consistency(
                key,
                format!("camera {} captured no shots", camera.index),
            ));
        }
        if position > 0 {
            let parent = camera.parent.as_ref().ok_or_else(|| {
                PipelineError::consistency(
                    key,
                    format!("camera {} has no parent; only the first camera may be a root", camera.index),
                )
            })?;
            let parent_camera = seen.get(&parent.camera_index).ok_or_else(|| {
                PipelineError::consistency(
                    key,
                    format!(
                        "camera {} names parent {} which is not an earlier camera of the scene",
                        camera.index, parent.camera_index
                    ),
                )
            })?;
            if !parent_camera.shot_indices.contains(&parent.shot_index) {
                return Err(PipelineError::consistency(
                    key,
                    format!(
                        "camera {} anchors on shot {} which camera {} did not capture",
                        camera.index, parent.shot_index, parent.camera_index
                    ),
                ));
            }
        }
        if seen.insert(camera.index, camera).is_some() {
            return Err(PipelineError::consistency(
                key,
                format!("camera {} appears twice", camera.index),
            ));
        }
    }
    Ok(())
}

/// Check that a stored tree still describes the given shots.
pub fn validate_against_shots(
    key: &ArtifactKey,
    cameras: &[Camera],
    shots: &[ShotDescription],
) -> Result<(), PipelineError> {
    let expected = group_cameras(shots);
    let matches = expected.len() == cameras.len()
        && expected
            .iter()
            .zip(cameras)
            .all(|(e, c)| e.index == c.index && e.shot_indices == c.shot_indices);
    if !matches {
        return Err(PipelineError::consistency(
            key,
            "stored camera tree does not match the scene's shots",
        ));
    }
    validate_tree(key, cameras)
}

/// Camera indices from `camera_index` up to the root, inclusive.
pub fn path_to_root(cameras: &[Camera], camera_index: usize) -> Option<Vec<usize>> {
    let by_index: HashMap<usize, &Camera> = cameras.iter().map(|c| (c.index, c)).collect();
    let mut path = vec![camera_index];
    let mut current = *by_index.get(&camera_index)?;
    while let Some(parent) = &current.parent {
        if path.len() > cameras.len() {
            return None;
        }
        path.push(parent.camera_index);
        current = by_index.get(&parent.camera_index)?;
    }
    Some(path)
}
