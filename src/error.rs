//! Error types for the reelsmith production pipeline.

use crate::types::ArtifactKey;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Artifact I/O error at {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session store error: {0}")]
    Session(String),
}

impl StorageError {
    pub fn io(key: &ArtifactKey, source: std::io::Error) -> Self {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Pipeline errors. Every unit-of-work failure names the key it was producing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schema error at {key}: {message}")]
    Schema { key: String, message: String },

    #[error("Consistency error at {key}: {message}")]
    Consistency { key: String, message: String },

    #[error("Missing dependency {key}: {message}")]
    MissingDependency { key: String, message: String },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid continuation: {0}")]
    InvalidContinuation(String),

    #[error("Final cut assembly failed: {0}")]
    AssemblyFailed(String),
}

impl PipelineError {
    pub fn schema(key: &ArtifactKey, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn consistency(key: &ArtifactKey, message: impl Into<String>) -> Self {
        PipelineError::Consistency {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn missing(key: &ArtifactKey, message: impl Into<String>) -> Self {
        PipelineError::MissingDependency {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Transport/availability failures from a collaborator.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PipelineError::ProviderError(_)
                | PipelineError::ProviderRequestFailed(_)
                | PipelineError::ProviderAuthFailed(_)
                | PipelineError::ProviderRateLimit(_)
                | PipelineError::ProviderModelNotFound(_)
                | PipelineError::StorageError(_)
        )
    }

    /// The artifact key the failing unit of work was producing, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PipelineError::Schema { key, .. }
            | PipelineError::Consistency { key, .. }
            | PipelineError::MissingDependency { key, .. } => Some(key),
            PipelineError::StorageError(StorageError::Io { key, .. }) => Some(key),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}
