use super::{Stage, StageContext, StageId, StageOutput, Transition};
use crate::approval::{ApprovalGate, GateVerdict};
use crate::error::PipelineError;
use crate::record::ProductionRecord;
use async_trait::async_trait;
use tracing::info;

/// The only conditional edge of the pipeline: proceed, wait, or regenerate the story.
pub struct StoryApproval;

#[async_trait]
impl Stage for StoryApproval {
    fn id(&self) -> StageId {
        StageId::StoryApproval
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let gate = ApprovalGate::new(ctx.store.as_ref(), &ctx.layout);
        let transition = match gate.evaluate(&mut record, ctx.settings.auto_approve)? {
            GateVerdict::Proceed => Transition::Advance,
            GateVerdict::Suspend { token, prompt } => Transition::Suspend { token, prompt },
            GateVerdict::Regenerate => {
                info!(
                    run_id = %record.run_id,
                    revision = record.story_revision,
                    "story rejected; regenerating"
                );
                Transition::Rerun(StageId::DevelopStory)
            }
        };
        Ok(StageOutput { record, transition })
    }
}
