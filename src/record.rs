//! Production Record
//!
//! The single aggregate threaded through every stage. Stages take the record by
//! value, fill the fields they own and hand it back; nothing here is shared.

use crate::approval::ApprovalState;
use crate::types::{compute_run_id, ArtifactKey, RunId};
use serde::{Deserialize, Serialize};

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInputs {
    pub premise: String,
    pub constraints: String,
    pub style: String,
}

impl RunInputs {
    pub fn new(
        premise: impl Into<String>,
        constraints: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            premise: premise.into(),
            constraints: constraints.into(),
            style: style.into(),
        }
    }

    pub fn run_id(&self) -> RunId {
        compute_run_id(&self.premise, &self.constraints, &self.style)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(alias = "idx")]
    pub index: usize,
    #[serde(alias = "identifier_in_scene")]
    pub identifier: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    pub static_features: String,
    pub dynamic_features: String,
}

fn default_visible() -> bool {
    true
}

impl Character {
    /// Feature line used in portrait prompts.
    pub fn feature_summary(&self) -> String {
        format!(
            "(static) {}; (dynamic) {}",
            self.static_features, self.dynamic_features
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortraitView {
    Front,
    Side,
    Back,
}

impl PortraitView {
    pub const ALL: [PortraitView; 3] = [PortraitView::Front, PortraitView::Side, PortraitView::Back];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortraitView::Front => "front",
            PortraitView::Side => "side",
            PortraitView::Back => "back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortraitAsset {
    pub view: PortraitView,
    pub key: ArtifactKey,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterPortraits {
    pub character_index: usize,
    pub identifier: String,
    pub views: Vec<PortraitAsset>,
}

/// Storyboard entry: the brief version of a shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotBrief {
    #[serde(alias = "idx")]
    pub index: usize,
    #[serde(default)]
    pub is_last: bool,
    #[serde(alias = "cam_idx")]
    pub camera_index: usize,
    #[serde(alias = "visual_desc")]
    pub visual_description: String,
    #[serde(alias = "audio_desc", default)]
    pub audio_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationType {
    Small,
    Medium,
    Large,
}

impl VariationType {
    /// Medium and large variations are anchored by an explicit last frame.
    pub fn needs_last_frame(&self) -> bool {
        matches!(self, VariationType::Medium | VariationType::Large)
    }
}

/// Fully decomposed shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotDescription {
    pub index: usize,
    pub camera_index: usize,
    pub first_frame: String,
    pub last_frame: String,
    pub motion: String,
    pub audio: String,
    pub variation: VariationType,
    pub first_frame_characters: Vec<usize>,
    pub last_frame_characters: Vec<usize>,
}

/// Why a camera hangs under its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraParent {
    pub camera_index: usize,
    pub shot_index: usize,
    pub reason: String,
    pub fully_covers_child: bool,
    pub missing_info: Option<String>,
}

/// Logical vantage point reused across shots of one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub index: usize,
    pub shot_indices: Vec<usize>,
    pub parent: Option<CameraParent>,
}

impl Camera {
    pub fn new(index: usize, first_shot: usize) -> Self {
        Self {
            index,
            shot_indices: vec![first_shot],
            parent: None,
        }
    }

    pub fn first_shot(&self) -> usize {
        self.shot_indices[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSlot {
    First,
    Last,
}

impl FrameSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameSlot::First => "first",
            FrameSlot::Last => "last",
        }
    }
}

/// Rendered key frames of one shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotFrames {
    pub shot_index: usize,
    pub first: ArtifactKey,
    pub last: Option<ArtifactKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    pub script: String,
    #[serde(default)]
    pub storyboard: Vec<ShotBrief>,
    #[serde(default)]
    pub shots: Vec<ShotDescription>,
    #[serde(default)]
    pub cameras: Vec<Camera>,
    #[serde(default)]
    pub frames: Vec<ShotFrames>,
    #[serde(default)]
    pub videos: Vec<ArtifactKey>,
}

impl Scene {
    pub fn new(index: usize, script: String) -> Self {
        Self {
            index,
            script,
            storyboard: Vec::new(),
            shots: Vec::new(),
            cameras: Vec::new(),
            frames: Vec::new(),
            videos: Vec::new(),
        }
    }

    pub fn frames_for(&self, shot_index: usize) -> Option<&ShotFrames> {
        self.frames.iter().find(|f| f.shot_index == shot_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub run_id: RunId,
    pub inputs: RunInputs,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub story_revision: u32,
    /// Steering feedback from the most recent rejection, if any.
    #[serde(default)]
    pub story_feedback: Option<String>,
    #[serde(default)]
    pub approval: ApprovalState,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub portraits: Vec<CharacterPortraits>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub final_cut: Option<ArtifactKey>,
}

impl ProductionRecord {
    pub fn new(inputs: RunInputs) -> Self {
        Self {
            run_id: inputs.run_id(),
            inputs,
            story: None,
            story_revision: 0,
            story_feedback: None,
            approval: ApprovalState::default(),
            characters: Vec::new(),
            portraits: Vec::new(),
            scenes: Vec::new(),
            final_cut: None,
        }
    }

    pub fn portraits_of(&self, character_index: usize) -> Option<&CharacterPortraits> {
        self.portraits
            .iter()
            .find(|p| p.character_index == character_index)
    }

    /// Total number of shots across all scenes.
    pub fn shot_count(&self) -> usize {
        self.scenes.iter().map(|s| s.shots.len()).sum()
    }
}
