//! Durable sled-backed run sessions.
//!
//! Artifacts are the checkpoints; sessions are only bookkeeping so the CLI can
//! list runs and find the continuation a suspended run is waiting on.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::approval::ContinuationToken;
use crate::error::StorageError;
use crate::types::{ArtifactKey, RunId};

const TREE_RUNS: &str = "runs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Suspended => "suspended",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSession {
    pub run_id: RunId,
    pub premise: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pending: Option<ContinuationToken>,
    #[serde(default)]
    pub final_cut: Option<ArtifactKey>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RunSession {
    pub fn start(run_id: RunId, premise: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            premise: premise.into(),
            status: RunStatus::Running,
            started_at: now,
            updated_at: now,
            pending: None,
            final_cut: None,
            last_error: None,
        }
    }
}

#[derive(Clone)]
pub struct RunSessionStore {
    db: Db,
    runs: Tree,
}

impl RunSessionStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(to_storage)?;
        Self::new(db)
    }

    pub fn new(db: Db) -> Result<Self, StorageError> {
        let runs = db.open_tree(TREE_RUNS).map_err(to_storage)?;
        Ok(Self { db, runs })
    }

    pub fn put(&self, session: &RunSession) -> Result<(), StorageError> {
        let value = serde_json::to_vec(session).map_err(to_storage_data)?;
        self.runs
            .insert(session.run_id.as_bytes(), value)
            .map_err(to_storage)?;
        Ok(())
    }

    pub fn get(&self, run_id: &str) -> Result<Option<RunSession>, StorageError> {
        let Some(raw) = self.runs.get(run_id.as_bytes()).map_err(to_storage)? else {
            return Ok(None);
        };
        let parsed = serde_json::from_slice(&raw).map_err(to_storage_data)?;
        Ok(Some(parsed))
    }

    /// Most recently updated first.
    pub fn list(&self) -> Result<Vec<RunSession>, StorageError> {
        let mut out = Vec::new();
        for result in self.runs.iter() {
            let (_, value) = result.map_err(to_storage)?;
            let session: RunSession = serde_json::from_slice(&value).map_err(to_storage_data)?;
            out.push(session);
        }
        out.sort_by_key(|s| std::cmp::Reverse(s.updated_at));
        Ok(out)
    }

    /// Apply `change` to the stored session, starting one if none exists.
    pub fn update<F>(&self, run_id: &str, premise: &str, change: F) -> Result<RunSession, StorageError>
    where
        F: FnOnce(&mut RunSession),
    {
        let mut session = self
            .get(run_id)?
            .unwrap_or_else(|| RunSession::start(run_id.to_string(), premise));
        change(&mut session);
        session.updated_at = Utc::now();
        self.put(&session)?;
        Ok(session)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage)?;
        Ok(())
    }
}

fn to_storage(err: sled::Error) -> StorageError {
    StorageError::Session(err.to_string())
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::Session(format!("corrupt session record: {err}"))
}
