//! Reference-Asset Selector
//!
//! Picks the prior artifacts (portrait views, earlier frames) that condition the
//! generation of a new frame. Large pools are first narrowed on descriptions alone;
//! the final pass looks at the images themselves and writes the generation
//! instruction, which addresses references by their position in the final list.

use crate::error::PipelineError;
use crate::prompts;
use crate::provider::{parse_structured, GenerationRequest, GenerationService, GenerationTask};
use crate::store::ArtifactStore;
use crate::types::ArtifactKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Pools at least this large get a text-only narrowing pass first.
pub const PRESELECT_THRESHOLD: usize = 8;
/// Most candidates the text-only pass may keep.
pub const PRESELECT_CAP: usize = 8;
/// Most references the final pass may keep.
pub const FINAL_CAP: usize = 3;

/// One selectable prior artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub key: ArtifactKey,
    pub description: String,
    /// Set for portrait views, so at most one view per character is kept.
    #[serde(default)]
    pub character: Option<usize>,
}

impl ReferenceCandidate {
    pub fn frame(key: ArtifactKey, description: String) -> Self {
        Self {
            key,
            description,
            character: None,
        }
    }

    pub fn portrait(key: ArtifactKey, description: String, character: usize) -> Self {
        Self {
            key,
            description,
            character: Some(character),
        }
    }
}

/// Selection response as answered by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub ref_image_indices: Vec<usize>,
    #[serde(default)]
    pub text_prompt: String,
}

/// Final, bounded selection for one target frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSelection {
    pub references: Vec<ReferenceCandidate>,
    pub instruction: String,
    #[serde(default)]
    pub preselected: bool,
}

impl ReferenceSelection {
    /// Image prompt: each reference introduced by its final position, then the
    /// instruction.
    pub fn image_prompt(&self) -> String {
        let mut prompt = String::new();
        for (position, reference) in self.references.iter().enumerate() {
            prompt.push_str(&format!("Image {}: {}\n", position, reference.description));
        }
        prompt.push_str(&self.instruction);
        prompt
    }
}

/// Positions named as "Image N" inside an instruction, in any letter case.
pub fn referenced_positions(instruction: &str) -> Vec<usize> {
    const MARKER: &str = "image ";
    let lowered = instruction.to_ascii_lowercase();
    let mut positions = Vec::new();
    let mut rest = lowered.as_str();
    while let Some(at) = rest.find(MARKER) {
        rest = &rest[at + MARKER.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(position) = digits.parse() {
            positions.push(position);
        }
    }
    positions
}

/// Check and bound one phase's answer against a pool of `pool_len` candidates.
///
/// Out-of-range or repeated indices are rejected. An over-long answer is cut to
/// `cap` only when `instruction` (if checked) does not name a dropped position.
pub fn reconcile(
    key: &ArtifactKey,
    pool_len: usize,
    cap: usize,
    indices: &[usize],
    instruction: Option<&str>,
) -> Result<Vec<usize>, PipelineError> {
    let mut seen = HashSet::new();
    for &index in indices {
        if index >= pool_len {
            return Err(PipelineError::consistency(
                key,
                format!("selected candidate {index} but only {pool_len} were offered"),
            ));
        }
        if !seen.insert(index) {
            return Err(PipelineError::consistency(
                key,
                format!("candidate {index} selected twice"),
            ));
        }
    }

    let referenced = instruction.map(referenced_positions).unwrap_or_default();
    let mut kept = indices.to_vec();
    if kept.len() > cap {
        if let Some(dropped) = referenced.iter().find(|&&p| p >= cap) {
            return Err(PipelineError::consistency(
                key,
                format!(
                    "{} references selected (cap {cap}) and the instruction uses dropped Image {dropped}",
                    kept.len()
                ),
            ));
        }
        warn!(key = %key, selected = kept.len(), cap, "selection over cap; truncating");
        kept.truncate(cap);
    }

    if let Some(bad) = referenced.iter().find(|&&p| p >= kept.len()) {
        return Err(PipelineError::consistency(
            key,
            format!(
                "instruction references Image {bad} but only {} references were selected",
                kept.len()
            ),
        ));
    }
    Ok(kept)
}

pub struct ReferenceSelector<'a> {
    service: &'a dyn GenerationService,
    store: &'a dyn ArtifactStore,
}

impl<'a> ReferenceSelector<'a> {
    pub fn new(service: &'a dyn GenerationService, store: &'a dyn ArtifactStore) -> Self {
        Self { service, store }
    }

    /// Select references for the frame described by `target`. `key` is the
    /// selection's artifact key, used for error attribution.
    pub async fn select(
        &self,
        key: &ArtifactKey,
        target: &str,
        pool: Vec<ReferenceCandidate>,
    ) -> Result<ReferenceSelection, PipelineError> {
        if pool.is_empty() {
            debug!(key = %key, "no reference candidates; text-only generation");
            return Ok(ReferenceSelection {
                references: Vec::new(),
                instruction: target.to_string(),
                preselected: false,
            });
        }

        let preselected = pool.len() >= PRESELECT_THRESHOLD;
        let pool = if preselected {
            self.preselect(key, target, pool).await?
        } else {
            pool
        };

        let mut request = GenerationRequest::new(GenerationTask::ReferenceSelect, prompts::SELECT_REFERENCES)
            .text(format!("<FRAME_DESC>\n{}\n</FRAME_DESC>\n\n<SEQ_IMAGES>", target.trim()));
        for (position, candidate) in pool.iter().enumerate() {
            let bytes = self.store.read(&candidate.key)?.ok_or_else(|| {
                PipelineError::missing(
                    &candidate.key,
                    format!("reference image for selection {key} was never produced"),
                )
            })?;
            request = request
                .text(format!("Image {}: {}", position, candidate.description))
                .image(bytes);
        }
        request = request.text("</SEQ_IMAGES>");

        let raw = self.service.generate_text(request).await?;
        let response: SelectionResponse = parse_structured(key, &raw)?;
        let kept = reconcile(
            key,
            pool.len(),
            FINAL_CAP,
            &response.ref_image_indices,
            Some(&response.text_prompt),
        )?;

        let references: Vec<ReferenceCandidate> = kept.iter().map(|&i| pool[i].clone()).collect();
        let mut characters = HashSet::new();
        for reference in &references {
            if let Some(character) = reference.character {
                if !characters.insert(character) {
                    return Err(PipelineError::consistency(
                        key,
                        format!("more than one portrait view of character {character} selected"),
                    ));
                }
            }
        }

        Ok(ReferenceSelection {
            references,
            instruction: response.text_prompt,
            preselected,
        })
    }

    async fn preselect(
        &self,
        key: &ArtifactKey,
        target: &str,
        pool: Vec<ReferenceCandidate>,
    ) -> Result<Vec<ReferenceCandidate>, PipelineError> {
        let descriptions = pool
            .iter()
            .enumerate()
            .map(|(i, c)| format!("Image {}: {}", i, c.description))
            .collect::<Vec<_>>()
            .join("\n");
        let request = GenerationRequest::new(GenerationTask::ReferencePreselect, prompts::PRESELECT_REFERENCES)
            .text(format!(
                "<FRAME_DESC>\n{}\n</FRAME_DESC>\n\n<SEQ_DESC>\n{}\n</SEQ_DESC>",
                target.trim(),
                descriptions
            ));
        let raw = self.service.generate_text(request).await?;
        let response: SelectionResponse = parse_structured(key, &raw)?;
        let kept = reconcile(key, pool.len(), PRESELECT_CAP, &response.ref_image_indices, None)?;
        debug!(key = %key, offered = pool.len(), kept = kept.len(), "references preselected");
        Ok(kept.into_iter().map(|i| pool[i].clone()).collect())
    }
}
