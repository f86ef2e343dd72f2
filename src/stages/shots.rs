use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationTask};
use crate::record::{Character, ProductionRecord, ShotBrief, ShotDescription, VariationType};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Deserialize)]
struct ShotResponse {
    ff_desc: String,
    #[serde(default)]
    lf_desc: String,
    motion_desc: String,
    #[serde(default)]
    audio_desc: String,
    variation_type: VariationType,
    #[serde(default)]
    ff_vis_char_idxs: Vec<usize>,
    #[serde(default)]
    lf_vis_char_idxs: Vec<usize>,
}

/// Brief shot → full shot description, one unit of work per shot.
pub struct DesignShots;

#[async_trait]
impl Stage for DesignShots {
    fn id(&self) -> StageId {
        StageId::DesignShots
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let mut scenes = std::mem::take(&mut record.scenes);
        for scene in &mut scenes {
            let briefs = scene.storyboard.clone();
            let scene_index = scene.index;
            let shots = for_each_unit(ctx.settings.max_concurrent_units, briefs, |brief| {
                describe_shot(ctx, scene_index, brief, &record.characters, &record.inputs.style)
            })
            .await?;
            scene.shots = shots;
        }
        record.scenes = scenes;
        Ok(StageOutput::advance(record))
    }
}

async fn describe_shot(
    ctx: &StageContext,
    scene_index: usize,
    brief: ShotBrief,
    characters: &[Character],
    style: &str,
) -> Result<ShotDescription, PipelineError> {
    let key = ctx.layout.shot_description(scene_index, brief.index)?;
    let shot: ShotDescription = ctx
        .memo
        .json(&key, || async {
            let request = GenerationRequest::new(GenerationTask::ShotDescription, prompts::DESIGN_SHOT)
                .text(prompts::shot_request(&brief, characters, style));
            let raw = ctx.service.generate_text(request).await?;
            let response: ShotResponse = parse_structured(&key, &raw)?;
            let shot = ShotDescription {
                index: brief.index,
                camera_index: brief.camera_index,
                first_frame: response.ff_desc,
                last_frame: response.lf_desc,
                motion: response.motion_desc,
                audio: response.audio_desc,
                variation: response.variation_type,
                first_frame_characters: response.ff_vis_char_idxs,
                last_frame_characters: response.lf_vis_char_idxs,
            };
            validate_shot(&key, &shot, &brief, characters.len())?;
            Ok(shot)
        })
        .await?;
    validate_shot(&key, &shot, &brief, characters.len())?;
    Ok(shot)
}

/// A shot keeps its storyboard identity and only names extracted characters.
pub fn validate_shot(
    key: &ArtifactKey,
    shot: &ShotDescription,
    brief: &ShotBrief,
    character_count: usize,
) -> Result<(), PipelineError> {
    if shot.index != brief.index || shot.camera_index != brief.camera_index {
        return Err(PipelineError::consistency(
            key,
            "shot description does not match its storyboard entry",
        ));
    }
    if shot.first_frame.trim().is_empty() {
        return Err(PipelineError::consistency(key, "first frame description is empty"));
    }
    if shot.variation.needs_last_frame() && shot.last_frame.trim().is_empty() {
        return Err(PipelineError::consistency(
            key,
            "medium/large variation needs a last frame description",
        ));
    }
    let visible = shot
        .first_frame_characters
        .iter()
        .chain(&shot.last_frame_characters);
    for &character in visible {
        if character >= character_count {
            return Err(PipelineError::consistency(
                key,
                format!(
                    "visible character {} is not one of the {} extracted characters",
                    character, character_count
                ),
            ));
        }
    }
    Ok(())
}
