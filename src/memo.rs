//! Memoization layer
//!
//! The one place stages go through to turn an idempotency key into a result.
//! A hit decodes the stored artifact; a miss runs the producer, publishes the
//! result and only then hands it back. If another producer published first, our
//! result is discarded and the stored one returned.

use crate::error::PipelineError;
use crate::store::{ArtifactStore, WriteOutcome};
use crate::types::ArtifactKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a guarded unit of work ran or was served from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Produced,
    LostRace,
}

#[derive(Clone)]
pub struct Memoizer {
    store: Arc<dyn ArtifactStore>,
}

impl Memoizer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    pub fn contains(&self, key: &ArtifactKey) -> Result<bool, PipelineError> {
        Ok(self.store.exists(key)?)
    }

    /// Read an artifact a previous stage must have produced.
    pub fn require(&self, key: &ArtifactKey) -> Result<Vec<u8>, PipelineError> {
        self.store
            .read(key)?
            .ok_or_else(|| PipelineError::missing(key, "expected artifact was never produced"))
    }

    /// Structured (JSON) unit of work.
    pub async fn json<T, F, Fut>(&self, key: &ArtifactKey, produce: F) -> Result<T, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        if let Some(bytes) = self.store.read(key)? {
            debug!(key = %key, "cache hit");
            return decode_json(key, &bytes);
        }

        let value = produce().await?;
        let encoded = serde_json::to_vec_pretty(&value)
            .map_err(|e| PipelineError::schema(key, format!("failed to encode: {e}")))?;
        match self.store.write(key, &encoded)? {
            WriteOutcome::Written => {
                debug!(key = %key, "artifact written");
                Ok(value)
            }
            WriteOutcome::AlreadyExists => {
                warn!(key = %key, "artifact published concurrently; discarding local result");
                decode_json(key, &self.require(key)?)
            }
        }
    }

    /// Plain-text unit of work.
    pub async fn text<F, Fut>(&self, key: &ArtifactKey, produce: F) -> Result<String, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, PipelineError>>,
    {
        if let Some(bytes) = self.store.read(key)? {
            debug!(key = %key, "cache hit");
            return decode_text(key, bytes);
        }

        let text = produce().await?;
        match self.store.write(key, text.as_bytes())? {
            WriteOutcome::Written => Ok(text),
            WriteOutcome::AlreadyExists => {
                warn!(key = %key, "artifact published concurrently; discarding local result");
                decode_text(key, self.require(key)?)
            }
        }
    }

    /// Binary media unit of work. Hits never load the blob.
    pub async fn blob<F, Fut>(&self, key: &ArtifactKey, produce: F) -> Result<CacheStatus, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, PipelineError>>,
    {
        if self.store.exists(key)? {
            debug!(key = %key, "cache hit");
            return Ok(CacheStatus::Hit);
        }

        let bytes = produce().await?;
        if bytes.is_empty() {
            return Err(PipelineError::schema(key, "generation returned an empty artifact"));
        }
        match self.store.write(key, &bytes)? {
            WriteOutcome::Written => Ok(CacheStatus::Produced),
            WriteOutcome::AlreadyExists => {
                warn!(key = %key, "artifact published concurrently; discarding local result");
                Ok(CacheStatus::LostRace)
            }
        }
    }
}

fn decode_json<T: DeserializeOwned>(key: &ArtifactKey, bytes: &[u8]) -> Result<T, PipelineError> {
    serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::schema(key, format!("stored artifact does not decode: {e}")))
}

fn decode_text(key: &ArtifactKey, bytes: Vec<u8>) -> Result<String, PipelineError> {
    String::from_utf8(bytes)
        .map_err(|e| PipelineError::schema(key, format!("stored text is not UTF-8: {e}")))
}
