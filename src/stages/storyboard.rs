use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationTask};
use crate::record::{Character, ProductionRecord, Scene, ShotBrief};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
struct StoryboardResponse {
    storyboard: Vec<ShotBrief>,
}

/// Scene script → brief shots, one unit of work per scene.
pub struct DesignStoryboard;

#[async_trait]
impl Stage for DesignStoryboard {
    fn id(&self) -> StageId {
        StageId::DesignStoryboard
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let scenes = std::mem::take(&mut record.scenes);
        let characters = &record.characters;
        let constraints = &record.inputs.constraints;
        let scenes = for_each_unit(ctx.settings.max_concurrent_units, scenes, |scene| {
            storyboard_for(ctx, scene, characters, constraints)
        })
        .await?;

        record.scenes = scenes;
        Ok(StageOutput::advance(record))
    }
}

async fn storyboard_for(
    ctx: &StageContext,
    mut scene: Scene,
    characters: &[Character],
    constraints: &str,
) -> Result<Scene, PipelineError> {
    let key = ctx.layout.storyboard(scene.index)?;
    let script = &scene.script;
    let storyboard: Vec<ShotBrief> = ctx
        .memo
        .json(&key, || async {
            let request =
                GenerationRequest::new(GenerationTask::Storyboard, prompts::DESIGN_STORYBOARD)
                    .text(prompts::storyboard_request(script, characters, constraints));
            let raw = ctx.service.generate_text(request).await?;
            let response: StoryboardResponse = parse_structured(&key, &raw)?;
            validate_storyboard(&key, &response.storyboard)?;
            Ok(response.storyboard)
        })
        .await?;
    validate_storyboard(&key, &storyboard)?;

    info!(scene = scene.index, shots = storyboard.len(), "storyboard designed");
    scene.storyboard = storyboard;
    Ok(scene)
}

/// Shots are numbered 0..n in order and there is at least one.
pub fn validate_storyboard(key: &ArtifactKey, storyboard: &[ShotBrief]) -> Result<(), PipelineError> {
    if storyboard.is_empty() {
        return Err(PipelineError::consistency(key, "storyboard has no shots"));
    }
    for (position, brief) in storyboard.iter().enumerate() {
        if brief.index != position {
            return Err(PipelineError::consistency(
                key,
                format!("shot at position {} has index {}", position, brief.index),
            ));
        }
    }
    Ok(())
}
