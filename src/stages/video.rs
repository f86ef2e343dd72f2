use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::VideoRequest;
use crate::record::{ProductionRecord, ShotDescription, ShotFrames};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use tracing::info;

/// One clip per shot, driven by its key frames and motion/audio description.
pub struct GenerateVideos;

#[async_trait]
impl Stage for GenerateVideos {
    fn id(&self) -> StageId {
        StageId::GenerateVideos
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        for scene in &mut record.scenes {
            let mut shots: Vec<(ShotDescription, Option<ShotFrames>)> = scene
                .shots
                .iter()
                .map(|shot| (shot.clone(), scene.frames_for(shot.index).cloned()))
                .collect();
            shots.sort_by_key(|(shot, _)| shot.index);

            let scene_index = scene.index;
            scene.videos = for_each_unit(ctx.settings.max_concurrent_units, shots, |(shot, frames)| {
                video_for(ctx, scene_index, shot, frames)
            })
            .await?;
            info!(scene = scene_index, clips = scene.videos.len(), "shot videos ready");
        }
        Ok(StageOutput::advance(record))
    }
}

async fn video_for(
    ctx: &StageContext,
    scene: usize,
    shot: ShotDescription,
    frames: Option<ShotFrames>,
) -> Result<ArtifactKey, PipelineError> {
    let key = ctx.layout.video(scene, shot.index)?;
    ctx.memo
        .blob(&key, || async {
            let frames = frames.ok_or_else(|| {
                PipelineError::missing(&key, format!("shot {} has no key frames", shot.index))
            })?;
            let mut images = vec![ctx.memo.require(&frames.first)?];
            if let Some(last) = &frames.last {
                images.push(ctx.memo.require(last)?);
            }
            ctx.service
                .generate_video(VideoRequest {
                    prompt: prompts::video_prompt(&shot),
                    frames: images,
                })
                .await
        })
        .await?;
    Ok(key)
}
