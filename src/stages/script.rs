use super::{Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationTask};
use crate::record::{ProductionRecord, Scene};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
struct ScriptResponse {
    script: Vec<String>,
}

/// Story → one script per scene.
pub struct WriteScript;

#[async_trait]
impl Stage for WriteScript {
    fn id(&self) -> StageId {
        StageId::WriteScript
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let key = ctx.layout.script()?;
        let story = record
            .story
            .as_deref()
            .ok_or_else(|| PipelineError::missing(&key, "script needs a developed story"))?;

        let scripts: Vec<String> = ctx
            .memo
            .json(&key, || async {
                let request = GenerationRequest::new(GenerationTask::Script, prompts::WRITE_SCRIPT)
                    .text(prompts::script_request(story, &record.inputs.constraints));
                let raw = ctx.service.generate_text(request).await?;
                let response: ScriptResponse = parse_structured(&key, &raw)?;
                validate_script(&key, &response.script)?;
                Ok(response.script)
            })
            .await?;
        validate_script(&key, &scripts)?;

        info!(run_id = %record.run_id, scenes = scripts.len(), "script written");
        record.scenes = scripts
            .into_iter()
            .enumerate()
            .map(|(index, script)| Scene::new(index, script))
            .collect();
        Ok(StageOutput::advance(record))
    }
}

/// At least one scene, and no scene without text.
pub fn validate_script(key: &ArtifactKey, scripts: &[String]) -> Result<(), PipelineError> {
    if scripts.is_empty() || scripts.iter().any(|s| s.trim().is_empty()) {
        return Err(PipelineError::consistency(key, "script must contain non-empty scenes"));
    }
    Ok(())
}
