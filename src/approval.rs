//! Story approval gate
//!
//! A two-state machine wrapped around the transition out of story development.
//! Suspension is plain data: a continuation (token plus record snapshot) written
//! once to the artifact store. Nothing is locked while a run waits, so a decision
//! may arrive at any later time, from any process.

use crate::error::PipelineError;
use crate::record::ProductionRecord;
use crate::stages::StageId;
use crate::store::{ArtifactStore, RunLayout, WriteOutcome};
use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Gate state carried on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    NotRequested,
    PendingApproval {
        revision: u32,
    },
    Approved {
        revision: u32,
    },
}

/// External approval decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
}

impl Decision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: String::new(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            approved: false,
            feedback: feedback.into(),
        }
    }
}

/// A decision as persisted next to the story revision it judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedDecision {
    pub revision: u32,
    pub approved: bool,
    pub feedback: String,
    #[serde(default)]
    pub automatic: bool,
    pub decided_at: DateTime<Utc>,
}

impl RecordedDecision {
    fn matches(&self, decision: &Decision) -> bool {
        self.approved == decision.approved && self.feedback == decision.feedback
    }
}

/// Serializable pointer back into a suspended run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub run_id: RunId,
    pub revision: u32,
    pub resume_at: StageId,
}

/// What the caller is shown while the run waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    pub run_id: RunId,
    pub revision: u32,
    pub story: String,
    pub message: String,
}

/// Persisted suspension: everything needed to pick the run back up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    pub token: ContinuationToken,
    pub prompt: ApprovalPrompt,
    pub record: ProductionRecord,
}

/// Where the executor goes after a decision has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// Story approved, continue with the stage after the gate.
    Proceed,
    /// Wait for a human decision.
    Suspend {
        token: ContinuationToken,
        prompt: ApprovalPrompt,
    },
    /// Story rejected: rerun story development with feedback.
    Regenerate,
}

pub struct ApprovalGate<'a> {
    store: &'a dyn ArtifactStore,
    layout: &'a RunLayout,
}

impl<'a> ApprovalGate<'a> {
    pub fn new(store: &'a dyn ArtifactStore, layout: &'a RunLayout) -> Self {
        Self { store, layout }
    }

    /// Previously recorded decision for `revision`, if any.
    pub fn decision_for(&self, revision: u32) -> Result<Option<RecordedDecision>, PipelineError> {
        let key = self.layout.story_decision(revision)?;
        match self.store.read(&key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PipelineError::schema(&key, format!("invalid decision marker: {e}"))),
            None => Ok(None),
        }
    }

    /// Drive the gate for the record's current story revision.
    pub fn evaluate(
        &self,
        record: &mut ProductionRecord,
        auto_approve: bool,
    ) -> Result<GateVerdict, PipelineError> {
        let revision = record.story_revision;
        if let Some(recorded) = self.decision_for(revision)? {
            return Ok(self.apply(record, &recorded));
        }

        if auto_approve {
            let recorded = self.record_decision(revision, &Decision::approve(), true)?;
            info!(run_id = %record.run_id, revision, "story approved automatically");
            return Ok(self.apply(record, &recorded));
        }

        let story = record.story.clone().ok_or_else(|| {
            PipelineError::InvalidContinuation(format!(
                "run {} reached approval without a story",
                record.run_id
            ))
        })?;
        record.approval = ApprovalState::PendingApproval { revision };
        let prompt = ApprovalPrompt {
            run_id: record.run_id.clone(),
            revision,
            story,
            message: "Review the developed story. Approve to continue production or reject with feedback to regenerate it.".to_string(),
        };
        let token = ContinuationToken {
            run_id: record.run_id.clone(),
            revision,
            resume_at: StageId::StoryApproval,
        };
        let continuation = Continuation {
            token: token.clone(),
            prompt: prompt.clone(),
            record: record.clone(),
        };
        self.persist_continuation(&continuation)?;
        info!(run_id = %record.run_id, revision, "run suspended pending story approval");
        Ok(GateVerdict::Suspend { token, prompt })
    }

    fn apply(&self, record: &mut ProductionRecord, recorded: &RecordedDecision) -> GateVerdict {
        if recorded.approved {
            record.approval = ApprovalState::Approved {
                revision: recorded.revision,
            };
            GateVerdict::Proceed
        } else {
            record.approval = ApprovalState::NotRequested;
            record.story_feedback = Some(recorded.feedback.clone());
            GateVerdict::Regenerate
        }
    }

    /// Load the suspended state a token points at.
    pub fn load_continuation(&self, token: &ContinuationToken) -> Result<Continuation, PipelineError> {
        let key = self.layout.continuation(token.revision)?;
        let bytes = self.store.read(&key)?.ok_or_else(|| {
            PipelineError::InvalidContinuation(format!(
                "no suspended run {} at story revision {}",
                token.run_id, token.revision
            ))
        })?;
        let continuation: Continuation = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::schema(&key, format!("invalid continuation: {e}")))?;
        if continuation.token != *token {
            return Err(PipelineError::InvalidContinuation(format!(
                "token does not match the continuation stored at {key}"
            )));
        }
        Ok(continuation)
    }

    /// Most recent continuation for a run, used when only the run id is known.
    pub fn latest_continuation(&self) -> Result<Option<Continuation>, PipelineError> {
        let mut latest = None;
        let mut revision = 0;
        loop {
            let key = self.layout.continuation(revision)?;
            match self.store.read(&key)? {
                Some(bytes) => {
                    let continuation: Continuation = serde_json::from_slice(&bytes)
                        .map_err(|e| PipelineError::schema(&key, format!("invalid continuation: {e}")))?;
                    latest = Some(continuation);
                    revision += 1;
                }
                None => return Ok(latest),
            }
        }
    }

    /// Persist an external decision. Repeating the same decision is a no-op,
    /// contradicting an earlier one is refused.
    pub fn submit(
        &self,
        token: &ContinuationToken,
        decision: &Decision,
    ) -> Result<RecordedDecision, PipelineError> {
        if let Some(existing) = self.decision_for(token.revision)? {
            if existing.matches(decision) {
                warn!(run_id = %token.run_id, revision = token.revision, "decision already recorded");
                return Ok(existing);
            }
            return Err(PipelineError::InvalidContinuation(format!(
                "story revision {} of run {} was already {}",
                token.revision,
                token.run_id,
                if existing.approved { "approved" } else { "rejected" }
            )));
        }
        if !decision.approved && decision.feedback.trim().is_empty() {
            return Err(PipelineError::InvalidContinuation(
                "a rejection must carry feedback for the next story draft".to_string(),
            ));
        }
        self.record_decision(token.revision, decision, false)
    }

    fn record_decision(
        &self,
        revision: u32,
        decision: &Decision,
        automatic: bool,
    ) -> Result<RecordedDecision, PipelineError> {
        let key = self.layout.story_decision(revision)?;
        let recorded = RecordedDecision {
            revision,
            approved: decision.approved,
            feedback: decision.feedback.clone(),
            automatic,
            decided_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&recorded)
            .map_err(|e| PipelineError::schema(&key, e.to_string()))?;
        match self.store.write(&key, &bytes)? {
            WriteOutcome::Written => Ok(recorded),
            // a concurrent submitter won; trust what is on disk
            WriteOutcome::AlreadyExists => self
                .decision_for(revision)?
                .ok_or_else(|| PipelineError::missing(&key, "decision marker vanished")),
        }
    }

    fn persist_continuation(&self, continuation: &Continuation) -> Result<(), PipelineError> {
        let key = self.layout.continuation(continuation.token.revision)?;
        let bytes = serde_json::to_vec_pretty(continuation)
            .map_err(|e| PipelineError::schema(&key, e.to_string()))?;
        if self.store.write(&key, &bytes)? == WriteOutcome::AlreadyExists {
            info!(key = %key, "continuation already recorded");
        }
        Ok(())
    }
}
