//! Pipeline stages
//!
//! Each stage owns a slice of the production record. It receives the record by
//! value, fills its fields through the memoizer and hands the record back together
//! with the transition the executor should take next.

use crate::approval::{ApprovalPrompt, ContinuationToken};
use crate::assemble::Concatenator;
use crate::config::PipelineSettings;
use crate::error::PipelineError;
use crate::memo::Memoizer;
use crate::provider::GenerationService;
use crate::record::ProductionRecord;
use crate::store::{ArtifactStore, RunLayout};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

pub mod camera;
pub mod characters;
pub mod final_cut;
pub mod frames;
pub mod gate;
pub mod portraits;
pub mod script;
pub mod shots;
pub mod story;
pub mod storyboard;
pub mod video;

/// Stage identifiers in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    DevelopStory,
    StoryApproval,
    ExtractCharacters,
    GeneratePortraits,
    WriteScript,
    DesignStoryboard,
    DesignShots,
    ConstructCameraTree,
    GenerateFrames,
    GenerateVideos,
    MergeFinalCut,
}

impl StageId {
    pub const ORDER: [StageId; 11] = [
        StageId::DevelopStory,
        StageId::StoryApproval,
        StageId::ExtractCharacters,
        StageId::GeneratePortraits,
        StageId::WriteScript,
        StageId::DesignStoryboard,
        StageId::DesignShots,
        StageId::ConstructCameraTree,
        StageId::GenerateFrames,
        StageId::GenerateVideos,
        StageId::MergeFinalCut,
    ];

    pub fn position(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::DevelopStory => "develop_story",
            StageId::StoryApproval => "story_approval",
            StageId::ExtractCharacters => "extract_characters",
            StageId::GeneratePortraits => "generate_portraits",
            StageId::WriteScript => "write_script",
            StageId::DesignStoryboard => "design_storyboard",
            StageId::DesignShots => "design_shots",
            StageId::ConstructCameraTree => "construct_camera_tree",
            StageId::GenerateFrames => "generate_frames",
            StageId::GenerateVideos => "generate_videos",
            StageId::MergeFinalCut => "merge_final_cut",
        }
    }
}

/// What the executor does after a stage returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Advance,
    Suspend {
        token: ContinuationToken,
        prompt: ApprovalPrompt,
    },
    /// Re-enter at an upstream stage and run everything after it again.
    Rerun(StageId),
}

#[derive(Debug)]
pub struct StageOutput {
    pub record: ProductionRecord,
    pub transition: Transition,
}

impl StageOutput {
    pub fn advance(record: ProductionRecord) -> Self {
        Self {
            record,
            transition: Transition::Advance,
        }
    }
}

/// Collaborators shared by every stage of one run.
pub struct StageContext {
    pub service: Arc<dyn GenerationService>,
    pub store: Arc<dyn ArtifactStore>,
    pub memo: Memoizer,
    pub concatenator: Arc<dyn Concatenator>,
    pub settings: PipelineSettings,
    pub layout: RunLayout,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    async fn run(
        &self,
        ctx: &StageContext,
        record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError>;
}

/// Every stage, indexed by `StageId::position`.
pub fn pipeline() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(story::DevelopStory),
        Box::new(gate::StoryApproval),
        Box::new(characters::ExtractCharacters),
        Box::new(portraits::GeneratePortraits),
        Box::new(script::WriteScript),
        Box::new(storyboard::DesignStoryboard),
        Box::new(shots::DesignShots),
        Box::new(camera::ConstructCameraTree),
        Box::new(frames::GenerateFrames),
        Box::new(video::GenerateVideos),
        Box::new(final_cut::MergeFinalCut),
    ]
}

/// Run independent units of work at most `limit` at a time. Results come back
/// in input order; the first failure aborts the rest.
pub async fn for_each_unit<T, R, F, Fut>(
    limit: usize,
    units: Vec<T>,
    work: F,
) -> Result<Vec<R>, PipelineError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, PipelineError>>,
{
    let mut results = Vec::with_capacity(units.len());
    let mut pending = stream::iter(units).map(work).buffered(limit.max(1));
    while let Some(result) = pending.next().await {
        results.push(result?);
    }
    Ok(results)
}
