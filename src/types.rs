//! Core identifier types: artifact keys and run ids.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic hierarchical key addressing one artifact, e.g.
/// `3fa1c2d4e5f60718/scene_0/shot_2/video.mp4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Parse and validate a `/`-separated key.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        for segment in raw.split('/') {
            validate_segment(segment).map_err(|reason| {
                StorageError::InvalidKey(format!("{raw}: {reason}"))
            })?;
        }
        Ok(Self(raw.to_string()))
    }

    /// Single-segment key.
    pub fn root(segment: &str) -> Result<Self, StorageError> {
        validate_segment(segment)
            .map_err(|reason| StorageError::InvalidKey(format!("{segment}: {reason}")))?;
        Ok(Self(segment.to_string()))
    }

    /// Append one segment.
    pub fn join(&self, segment: &str) -> Result<Self, StorageError> {
        validate_segment(segment).map_err(|reason| {
            StorageError::InvalidKey(format!("{}/{segment}: {reason}", self.0))
        })?;
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment (the artifact name).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment == "." || segment == ".." {
        return Err("relative segment");
    }
    if segment.contains('\\') || segment.contains('\0') {
        return Err("illegal character in segment");
    }
    Ok(())
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ArtifactKey::parse(&value)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.0
    }
}

/// Identifier of one production run.
pub type RunId = String;

const RUN_ID_HEX_LEN: usize = 16;

/// Derive the run id from the request inputs so that the same request always
/// lands on the same artifact tree.
pub fn compute_run_id(premise: &str, constraints: &str, style: &str) -> RunId {
    let mut hasher = blake3::Hasher::new();
    for part in [premise, constraints, style] {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..RUN_ID_HEX_LEN / 2])
}

/// Turn free text (e.g. a character name) into a key-safe segment.
pub fn slugify(text: &str) -> String {
    let slug: String = text
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}
