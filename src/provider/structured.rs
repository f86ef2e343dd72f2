//! Parsing of structured (JSON) model responses.

use crate::error::PipelineError;
use crate::types::ArtifactKey;
use serde::de::DeserializeOwned;

/// Decode a model response into `T`, tolerating a surrounding Markdown code fence.
/// Failures are schema errors attributed to `key`.
pub fn parse_structured<T: DeserializeOwned>(key: &ArtifactKey, raw: &str) -> Result<T, PipelineError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| {
        PipelineError::schema(key, format!("response does not match expected schema: {e}"))
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. "json")
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
