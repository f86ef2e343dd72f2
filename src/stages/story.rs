//! Story development.
//!
//! Stories are versioned: revision `r` lives at `story/v{r}.txt`. Revisions that
//! were rejected are skipped, and the newest rejection's draft and feedback steer
//! the next request.

use super::{Stage, StageContext, StageId, StageOutput};
use crate::approval::{ApprovalGate, ApprovalState};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{GenerationRequest, GenerationTask};
use crate::record::ProductionRecord;
use async_trait::async_trait;
use tracing::info;

pub struct DevelopStory;

#[async_trait]
impl Stage for DevelopStory {
    fn id(&self) -> StageId {
        StageId::DevelopStory
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let gate = ApprovalGate::new(ctx.store.as_ref(), &ctx.layout);

        let mut revision = 0;
        let mut rejected: Option<(String, String)> = None;
        while let Some(decision) = gate.decision_for(revision)? {
            if decision.approved {
                break;
            }
            let draft_key = ctx.layout.story(revision)?;
            let draft = String::from_utf8_lossy(&ctx.memo.require(&draft_key)?).into_owned();
            rejected = Some((draft, decision.feedback));
            revision += 1;
        }

        let key = ctx.layout.story(revision)?;
        let inputs = &record.inputs;
        let story = ctx
            .memo
            .text(&key, || async {
                let message = prompts::story_request(
                    &inputs.premise,
                    &inputs.constraints,
                    rejected.as_ref().map(|(draft, feedback)| (draft.as_str(), feedback.as_str())),
                );
                let request = GenerationRequest::new(GenerationTask::Story, prompts::DEVELOP_STORY)
                    .text(message);
                let story = ctx.service.generate_text(request).await?;
                if story.trim().is_empty() {
                    return Err(PipelineError::schema(&key, "story is empty"));
                }
                info!(run_id = %record.run_id, revision, "story developed");
                Ok(story)
            })
            .await?;

        record.story = Some(story);
        record.story_revision = revision;
        record.story_feedback = rejected.map(|(_, feedback)| feedback);
        record.approval = ApprovalState::NotRequested;
        Ok(StageOutput::advance(record))
    }
}
