//! Run layout: every artifact key of a run is derived here and nowhere else.

use crate::error::StorageError;
use crate::record::{FrameSlot, PortraitView};
use crate::types::{slugify, ArtifactKey};

#[derive(Debug, Clone)]
pub struct RunLayout {
    run: ArtifactKey,
}

impl RunLayout {
    pub fn new(run_id: &str) -> Result<Self, StorageError> {
        Ok(Self {
            run: ArtifactKey::root(run_id)?,
        })
    }

    pub fn run_key(&self) -> &ArtifactKey {
        &self.run
    }

    fn at(&self, segments: &[&str]) -> Result<ArtifactKey, StorageError> {
        segments
            .iter()
            .try_fold(self.run.clone(), |key, segment| key.join(segment))
    }

    pub fn story(&self, revision: u32) -> Result<ArtifactKey, StorageError> {
        self.at(&["story", &format!("v{revision}.txt")])
    }

    pub fn story_decision(&self, revision: u32) -> Result<ArtifactKey, StorageError> {
        self.at(&["story", &format!("v{revision}.decision.json")])
    }

    pub fn continuation(&self, revision: u32) -> Result<ArtifactKey, StorageError> {
        self.at(&["control", &format!("continuation_v{revision}.json")])
    }

    pub fn characters(&self) -> Result<ArtifactKey, StorageError> {
        self.at(&["characters.json"])
    }

    pub fn portrait(
        &self,
        character_index: usize,
        identifier: &str,
        view: PortraitView,
    ) -> Result<ArtifactKey, StorageError> {
        self.at(&[
            "character_portraits",
            &format!("{}_{}", character_index, slugify(identifier)),
            &format!("{}.png", view.as_str()),
        ])
    }

    pub fn script(&self) -> Result<ArtifactKey, StorageError> {
        self.at(&["script.json"])
    }

    pub fn storyboard(&self, scene: usize) -> Result<ArtifactKey, StorageError> {
        self.at(&[&scene_dir(scene), "storyboard.json"])
    }

    pub fn camera_tree(&self, scene: usize) -> Result<ArtifactKey, StorageError> {
        self.at(&[&scene_dir(scene), "camera_tree.json"])
    }

    pub fn shot_description(&self, scene: usize, shot: usize) -> Result<ArtifactKey, StorageError> {
        self.at(&[&scene_dir(scene), &shot_dir(shot), "shot_description.json"])
    }

    pub fn frame(&self, scene: usize, shot: usize, slot: FrameSlot) -> Result<ArtifactKey, StorageError> {
        self.at(&[
            &scene_dir(scene),
            &shot_dir(shot),
            &format!("{}_frame.png", slot.as_str()),
        ])
    }

    pub fn frame_selection(
        &self,
        scene: usize,
        shot: usize,
        slot: FrameSlot,
    ) -> Result<ArtifactKey, StorageError> {
        self.at(&[
            &scene_dir(scene),
            &shot_dir(shot),
            &format!("{}_frame_selector_output.json", slot.as_str()),
        ])
    }

    pub fn video(&self, scene: usize, shot: usize) -> Result<ArtifactKey, StorageError> {
        self.at(&[&scene_dir(scene), &shot_dir(shot), "video.mp4"])
    }

    pub fn final_cut(&self) -> Result<ArtifactKey, StorageError> {
        self.at(&["final_video.mp4"])
    }
}

fn scene_dir(scene: usize) -> String {
    format!("scene_{scene}")
}

fn shot_dir(shot: usize) -> String {
    format!("shot_{shot}")
}
