use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::camera_tree::{self, CameraTreeResponse};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationTask};
use crate::record::{Camera, ProductionRecord, Scene};
use async_trait::async_trait;
use tracing::{debug, info};

/// Per scene: group shots into cameras and attach each camera to a parent.
pub struct ConstructCameraTree;

#[async_trait]
impl Stage for ConstructCameraTree {
    fn id(&self) -> StageId {
        StageId::ConstructCameraTree
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let scenes = std::mem::take(&mut record.scenes);
        record.scenes = for_each_unit(ctx.settings.max_concurrent_units, scenes, |scene| {
            tree_for(ctx, scene)
        })
        .await?;
        Ok(StageOutput::advance(record))
    }
}

async fn tree_for(ctx: &StageContext, mut scene: Scene) -> Result<Scene, PipelineError> {
    let key = ctx.layout.camera_tree(scene.index)?;
    let shots = &scene.shots;
    let cameras: Vec<Camera> = ctx
        .memo
        .json(&key, || async {
            let cameras = camera_tree::group_cameras(shots);
            if cameras.len() <= 1 {
                debug!(key = %key, "single camera; no parent proposals needed");
                camera_tree::validate_tree(&key, &cameras)?;
                return Ok(cameras);
            }
            let request = GenerationRequest::new(GenerationTask::CameraTree, prompts::BUILD_CAMERA_TREE)
                .text(prompts::camera_tree_request(&cameras, shots));
            let raw = ctx.service.generate_text(request).await?;
            let response: CameraTreeResponse = parse_structured(&key, &raw)?;
            camera_tree::attach_parents(&key, cameras, response)
        })
        .await?;
    camera_tree::validate_against_shots(&key, &cameras, &scene.shots)?;

    info!(scene = scene.index, cameras = cameras.len(), "camera tree built");
    scene.cameras = cameras;
    Ok(scene)
}
