//! Filesystem artifact store
//!
//! Artifacts live at `{root}/{segment}/.../{name}`. Writes go to a named temp file
//! next to the target and are persisted without clobbering, which fails if the
//! target already exists. Readers therefore never observe a partial blob and
//! concurrent producers of the same key cannot overwrite each other.

use crate::error::StorageError;
use crate::store::{ArtifactStore, WriteOutcome};
use crate::types::ArtifactKey;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            key: root.display().to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `key`.
    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        key.segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Persist `bytes` at `target` unless something is already there.
    fn publish(key: &ArtifactKey, target: &Path, bytes: &[u8]) -> Result<WriteOutcome, StorageError> {
        let dir = target.parent().unwrap_or(Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StorageError::io(key, e))?;
        if let Err(e) = temp.write_all(bytes).and_then(|_| temp.flush()) {
            discard(key, temp);
            return Err(StorageError::io(key, e));
        }

        match temp.persist_noclobber(target) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(err) => {
                let kind = err.error.kind();
                discard(key, err.file);
                if kind == ErrorKind::AlreadyExists {
                    Ok(WriteOutcome::AlreadyExists)
                } else {
                    Err(StorageError::io(key, err.error))
                }
            }
        }
    }
}

fn discard(key: &ArtifactKey, temp: NamedTempFile) {
    let path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(key = %key, path = %path.display(), error = %e, "failed to remove temp file");
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError> {
        Ok(self.path_of(key).is_file())
    }

    fn read(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<WriteOutcome, StorageError> {
        let target = self.path_of(key);
        if target.is_file() {
            return Ok(WriteOutcome::AlreadyExists);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(key, e))?;
        }
        Self::publish(key, &target, bytes)
    }
}
