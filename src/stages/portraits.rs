use super::{for_each_unit, Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::ImageRequest;
use crate::record::{Character, CharacterPortraits, PortraitAsset, PortraitView, ProductionRecord};
use async_trait::async_trait;
use tracing::info;

/// Three views per character. The front view comes from text; side and back are
/// turned from the front view so the character stays the same person.
pub struct GeneratePortraits;

#[async_trait]
impl Stage for GeneratePortraits {
    fn id(&self) -> StageId {
        StageId::GeneratePortraits
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let style = record.inputs.style.clone();
        let characters = record.characters.clone();
        let portraits = for_each_unit(ctx.settings.max_concurrent_units, characters, |character| {
            portraits_for(ctx, character, &style)
        })
        .await?;

        info!(run_id = %record.run_id, characters = portraits.len(), "portraits ready");
        record.portraits = portraits;
        Ok(StageOutput::advance(record))
    }
}

async fn portraits_for(
    ctx: &StageContext,
    character: Character,
    style: &str,
) -> Result<CharacterPortraits, PipelineError> {
    let front_key = ctx
        .layout
        .portrait(character.index, &character.identifier, PortraitView::Front)?;
    let mut views = Vec::with_capacity(PortraitView::ALL.len());

    for view in PortraitView::ALL {
        let key = ctx.layout.portrait(character.index, &character.identifier, view)?;
        ctx.memo
            .blob(&key, || async {
                let request = match view {
                    PortraitView::Front => ImageRequest {
                        prompt: prompts::portrait_front(
                            &character.identifier,
                            &character.feature_summary(),
                            style,
                        ),
                        references: Vec::new(),
                    },
                    PortraitView::Side | PortraitView::Back => ImageRequest {
                        prompt: prompts::portrait_turn(&character.identifier, view.as_str()),
                        references: vec![ctx.memo.require(&front_key)?],
                    },
                };
                ctx.service.generate_image(request).await
            })
            .await?;

        views.push(PortraitAsset {
            view,
            key,
            description: prompts::portrait_description(&character.identifier, view.as_str()),
        });
    }

    Ok(CharacterPortraits {
        character_index: character.index,
        identifier: character.identifier,
        views,
    })
}
