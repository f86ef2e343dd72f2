//! Key-frame generation.
//!
//! Within a scene, cameras are walked in tree order so a camera's first shot can
//! lean on the frame its parent anchors it to. Later shots of a camera reuse that
//! camera's earlier first frames, and shots with noticeable variation get a last
//! frame conditioned on their own first frame. Scenes are independent; frames
//! inside one scene are generated one after another.

use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::ImageRequest;
use crate::record::{CharacterPortraits, FrameSlot, ProductionRecord, Scene, ShotFrames};
use crate::reference::{ReferenceCandidate, ReferenceSelection, ReferenceSelector};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub struct GenerateFrames;

#[async_trait]
impl Stage for GenerateFrames {
    fn id(&self) -> StageId {
        StageId::GenerateFrames
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let scenes = std::mem::take(&mut record.scenes);
        let portraits = &record.portraits;
        let scenes = for_each_unit(ctx.settings.max_concurrent_units, scenes, |scene| {
            frames_for_scene(ctx, scene, portraits)
        })
        .await?;
        record.scenes = scenes;
        Ok(StageOutput::advance(record))
    }
}

async fn frames_for_scene(
    ctx: &StageContext,
    mut scene: Scene,
    portraits: &[CharacterPortraits],
) -> Result<Scene, PipelineError> {
    let mut frames: BTreeMap<usize, ShotFrames> = BTreeMap::new();
    let mut first_frames: HashMap<usize, ReferenceCandidate> = HashMap::new();

    for camera in &scene.cameras {
        let mut earlier: Vec<ReferenceCandidate> = Vec::new();
        for (position, &shot_index) in camera.shot_indices.iter().enumerate() {
            let shot = scene
                .shots
                .iter()
                .find(|shot| shot.index == shot_index)
                .ok_or_else(|| {
                    let key = ctx.layout.shot_description(scene.index, shot_index);
                    match key {
                        Ok(key) => PipelineError::missing(&key, "camera references an undescribed shot"),
                        Err(e) => e.into(),
                    }
                })?;

            let mut pool = portrait_candidates(ctx, portraits, &shot.first_frame_characters)?;
            if position == 0 {
                if let Some(parent) = &camera.parent {
                    let anchor = first_frames.get(&parent.shot_index).cloned().ok_or_else(|| {
                        match ctx.layout.frame(scene.index, parent.shot_index, FrameSlot::First) {
                            Ok(key) => PipelineError::missing(&key, "parent camera frame not rendered"),
                            Err(e) => e.into(),
                        }
                    })?;
                    pool.push(anchor);
                }
            } else {
                pool.extend(earlier.iter().cloned());
            }

            let target = prompts::frame_description(camera.index, &shot.first_frame);
            let first = render_frame(ctx, scene.index, shot_index, FrameSlot::First, &target, pool).await?;
            let first_candidate = ReferenceCandidate::frame(first.clone(), target);
            earlier.push(first_candidate.clone());
            first_frames.insert(shot_index, first_candidate.clone());

            let last = if shot.variation.needs_last_frame() {
                let mut pool = portrait_candidates(ctx, portraits, &shot.last_frame_characters)?;
                pool.push(first_candidate);
                let target = prompts::frame_description(camera.index, &shot.last_frame);
                Some(render_frame(ctx, scene.index, shot_index, FrameSlot::Last, &target, pool).await?)
            } else {
                None
            };

            frames.insert(
                shot_index,
                ShotFrames {
                    shot_index,
                    first,
                    last,
                },
            );
        }
    }

    info!(scene = scene.index, frames = frames.len(), "key frames ready");
    scene.frames = frames.into_values().collect();
    Ok(scene)
}

/// All portrait views of the visible characters, in character order.
fn portrait_candidates(
    ctx: &StageContext,
    portraits: &[CharacterPortraits],
    visible: &[usize],
) -> Result<Vec<ReferenceCandidate>, PipelineError> {
    let mut candidates = Vec::new();
    for &character in visible {
        let set = portraits
            .iter()
            .find(|p| p.character_index == character)
            .ok_or_else(|| match ctx.layout.characters() {
                Ok(key) => PipelineError::missing(&key, format!("no portraits for character {}", character)),
                Err(e) => e.into(),
            })?;
        candidates.extend(set.views.iter().map(|asset| {
            ReferenceCandidate::portrait(asset.key.clone(), asset.description.clone(), character)
        }));
    }
    Ok(candidates)
}

async fn render_frame(
    ctx: &StageContext,
    scene: usize,
    shot: usize,
    slot: FrameSlot,
    target: &str,
    pool: Vec<ReferenceCandidate>,
) -> Result<ArtifactKey, PipelineError> {
    let key = ctx.layout.frame(scene, shot, slot)?;
    let selection_key = ctx.layout.frame_selection(scene, shot, slot)?;
    ctx.memo
        .blob(&key, || async {
            let selector = ReferenceSelector::new(ctx.service.as_ref(), ctx.store.as_ref());
            let selection: ReferenceSelection = ctx
                .memo
                .json(&selection_key, || selector.select(&selection_key, target, pool))
                .await?;

            let mut references = Vec::with_capacity(selection.references.len());
            for reference in &selection.references {
                references.push(ctx.memo.require(&reference.key)?);
            }
            ctx.service
                .generate_image(ImageRequest {
                    prompt: selection.image_prompt(),
                    references,
                })
                .await
        })
        .await?;
    Ok(key)
}
