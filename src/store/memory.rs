//! In-process artifact store.

use crate::error::StorageError;
use crate::store::{ArtifactStore, WriteOutcome};
use crate::types::ArtifactKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<BTreeMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<ArtifactKey> {
        self.blobs.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError> {
        Ok(self.blobs.read().contains_key(key))
    }

    fn read(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<WriteOutcome, StorageError> {
        let mut blobs = self.blobs.write();
        if blobs.contains_key(key) {
            return Ok(WriteOutcome::AlreadyExists);
        }
        blobs.insert(key.clone(), bytes.to_vec());
        Ok(WriteOutcome::Written)
    }
}
