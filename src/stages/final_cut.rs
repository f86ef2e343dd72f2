use super::{Stage, StageContext, StageId, StageOutput};
use crate::assemble;
use crate::error::PipelineError;
use crate::record::ProductionRecord;
use async_trait::async_trait;
use tracing::info;

pub struct MergeFinalCut;

#[async_trait]
impl Stage for MergeFinalCut {
    fn id(&self) -> StageId {
        StageId::MergeFinalCut
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let key = assemble::assemble(&ctx.memo, &ctx.layout, &record, ctx.concatenator.as_ref()).await?;
        info!(run_id = %record.run_id, final_cut = %key, "final cut ready");
        record.final_cut = Some(key);
        Ok(StageOutput::advance(record))
    }
}
