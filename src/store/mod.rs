//! Persistent Artifact Store
//!
//! Durable key → blob storage. The existence of an artifact is the checkpoint for
//! the unit of work that produces it, so writes never overwrite: the first writer
//! wins and later writers are told the artifact already exists.

pub mod fs;
pub mod layout;
pub mod memory;

pub use fs::FsArtifactStore;
pub use layout::RunLayout;
pub use memory::MemoryArtifactStore;

use crate::error::StorageError;
use crate::types::ArtifactKey;

/// Result of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyExists,
}

/// Artifact store interface
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError>;

    /// Returns `None` when the artifact has not been produced yet.
    fn read(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Publish `bytes` under `key` unless something is already there.
    fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<WriteOutcome, StorageError>;
}
