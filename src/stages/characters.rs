use super::{Stage, StageContext, StageId, StageOutput};
use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationTask};
use crate::record::{Character, ProductionRecord};
use crate::types::ArtifactKey;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

#[derive(Deserialize)]
struct CharactersResponse {
    characters: Vec<Character>,
}

/// Story → recurring characters.
pub struct ExtractCharacters;

#[async_trait]
impl Stage for ExtractCharacters {
    fn id(&self) -> StageId {
        StageId::ExtractCharacters
    }

    async fn run(
        &self,
        ctx: &StageContext,
        mut record: ProductionRecord,
    ) -> Result<StageOutput, PipelineError> {
        let key = ctx.layout.characters()?;
        let story = record
            .story
            .as_deref()
            .ok_or_else(|| PipelineError::missing(&key, "characters need a developed story"))?;

        let characters: Vec<Character> = ctx
            .memo
            .json(&key, || async {
                let request =
                    GenerationRequest::new(GenerationTask::Characters, prompts::EXTRACT_CHARACTERS)
                        .text(prompts::characters_request(story));
                let raw = ctx.service.generate_text(request).await?;
                let response: CharactersResponse = parse_structured(&key, &raw)?;
                validate_characters(&key, &response.characters)?;
                info!(run_id = %record.run_id, count = response.characters.len(), "characters extracted");
                Ok(response.characters)
            })
            .await?;
        validate_characters(&key, &characters)?;

        record.characters = characters;
        Ok(StageOutput::advance(record))
    }
}

/// Indices must be 0..n in order, identifiers non-empty and unique.
pub fn validate_characters(key: &ArtifactKey, characters: &[Character]) -> Result<(), PipelineError> {
    let mut identifiers = HashSet::new();
    for (position, character) in characters.iter().enumerate() {
        if character.index != position {
            return Err(PipelineError::consistency(
                key,
                format!("character at position {} has index {}", position, character.index),
            ));
        }
        let identifier = character.identifier.trim();
        if identifier.is_empty() {
            return Err(PipelineError::consistency(
                key,
                format!("character {} has no identifier", position),
            ));
        }
        if !identifiers.insert(identifier.to_string()) {
            return Err(PipelineError::consistency(
                key,
                format!("identifier '{}' is used twice", identifier),
            ));
        }
    }
    Ok(())
}
