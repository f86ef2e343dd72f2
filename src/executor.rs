//! Stage graph executor.
//!
//! Stages run in their fixed order from a cursor. A stage hands back the record
//! plus a transition: advance, suspend at the approval gate, or rerun an upstream
//! stage. Nothing survives a process exit except what stages wrote through the
//! memoizer, so running the same inputs again resumes where the last run stopped.

use crate::approval::{ApprovalGate, ApprovalPrompt, Continuation, ContinuationToken, Decision};
use crate::assemble::Concatenator;
use crate::config::PipelineSettings;
use crate::error::PipelineError;
use crate::memo::Memoizer;
use crate::provider::GenerationService;
use crate::record::{ProductionRecord, RunInputs};
use crate::session::{RunSessionStore, RunStatus};
use crate::stages::{pipeline, Stage, StageContext, StageId, Transition};
use crate::store::{ArtifactStore, RunLayout};
use crate::types::{ArtifactKey, RunId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// How a call into the engine ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        final_cut: ArtifactKey,
        record: ProductionRecord,
    },
    /// Waiting on a story decision; hand `token` back to [`PipelineEngine::resume`].
    Suspended {
        token: ContinuationToken,
        prompt: ApprovalPrompt,
    },
}

pub struct PipelineEngine {
    service: Arc<dyn GenerationService>,
    store: Arc<dyn ArtifactStore>,
    concatenator: Arc<dyn Concatenator>,
    settings: PipelineSettings,
    stages: Vec<Box<dyn Stage>>,
    sessions: Option<RunSessionStore>,
}

impl PipelineEngine {
    pub fn new(
        service: Arc<dyn GenerationService>,
        store: Arc<dyn ArtifactStore>,
        concatenator: Arc<dyn Concatenator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            service,
            store,
            concatenator,
            settings,
            stages: pipeline(),
            sessions: None,
        }
    }

    pub fn with_sessions(mut self, sessions: RunSessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Start (or pick back up) the run identified by `inputs`.
    pub async fn run(&self, inputs: RunInputs) -> Result<RunOutcome, PipelineError> {
        let record = ProductionRecord::new(inputs);
        info!(
            run_id = %record.run_id,
            provider = self.service.provider_name(),
            "run started"
        );
        self.drive(record, StageId::DevelopStory).await
    }

    /// Record an external decision for a suspended run and continue it.
    pub async fn resume(
        &self,
        token: &ContinuationToken,
        decision: Decision,
    ) -> Result<RunOutcome, PipelineError> {
        let layout = RunLayout::new(&token.run_id)?;
        let gate = ApprovalGate::new(self.store.as_ref(), &layout);
        let continuation = gate.load_continuation(token)?;
        let recorded = gate.submit(token, &decision)?;
        info!(
            run_id = %token.run_id,
            revision = token.revision,
            approved = recorded.approved,
            "decision recorded; resuming"
        );
        self.drive(continuation.record, token.resume_at).await
    }

    /// The continuation a run is currently waiting on, if any.
    pub fn pending(&self, run_id: &str) -> Result<Option<Continuation>, PipelineError> {
        let layout = RunLayout::new(run_id)?;
        let gate = ApprovalGate::new(self.store.as_ref(), &layout);
        match gate.latest_continuation()? {
            Some(continuation) if gate.decision_for(continuation.token.revision)?.is_none() => {
                Ok(Some(continuation))
            }
            _ => Ok(None),
        }
    }

    fn context(&self, run_id: &str) -> Result<StageContext, PipelineError> {
        Ok(StageContext {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            memo: Memoizer::new(Arc::clone(&self.store)),
            concatenator: Arc::clone(&self.concatenator),
            settings: self.settings.clone(),
            layout: RunLayout::new(run_id)?,
        })
    }

    async fn drive(
        &self,
        mut record: ProductionRecord,
        start: StageId,
    ) -> Result<RunOutcome, PipelineError> {
        let ctx = self.context(&record.run_id)?;
        let run_id: RunId = record.run_id.clone();
        let premise = record.inputs.premise.clone();
        self.note(&run_id, &premise, RunStatus::Running, |_| {});

        let mut cursor = start.position();
        while let Some(stage) = self.stages.get(cursor) {
            let id = stage.id();
            let started = Instant::now();
            info!(run_id = %run_id, stage = id.as_str(), "stage started");

            let output = match stage.run(&ctx, record).await {
                Ok(output) => output,
                Err(err) => {
                    error!(run_id = %run_id, stage = id.as_str(), error = %err, "stage failed");
                    let message = err.to_string();
                    self.note(&run_id, &premise, RunStatus::Failed, |s| {
                        s.last_error = Some(message);
                    });
                    return Err(err);
                }
            };
            record = output.record;
            info!(
                run_id = %run_id,
                stage = id.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );

            match output.transition {
                Transition::Advance => cursor += 1,
                Transition::Rerun(target) => {
                    info!(run_id = %run_id, from = id.as_str(), to = target.as_str(), "re-entering upstream stage");
                    cursor = target.position();
                }
                Transition::Suspend { token, prompt } => {
                    let pending = token.clone();
                    self.note(&run_id, &premise, RunStatus::Suspended, |s| {
                        s.pending = Some(pending);
                    });
                    return Ok(RunOutcome::Suspended { token, prompt });
                }
            }
        }

        let final_cut = match record.final_cut.clone() {
            Some(key) => key,
            None => {
                return Err(PipelineError::missing(
                    &ctx.layout.final_cut()?,
                    "pipeline finished without a final cut",
                ))
            }
        };
        let finished = final_cut.clone();
        self.note(&run_id, &premise, RunStatus::Completed, |s| {
            s.pending = None;
            s.last_error = None;
            s.final_cut = Some(finished);
        });
        info!(run_id = %run_id, final_cut = %final_cut, "run completed");
        Ok(RunOutcome::Completed { final_cut, record })
    }

    /// Session bookkeeping never fails a run.
    fn note<F>(&self, run_id: &str, premise: &str, status: RunStatus, change: F)
    where
        F: FnOnce(&mut crate::session::RunSession),
    {
        let Some(sessions) = &self.sessions else {
            return;
        };
        let result = sessions.update(run_id, premise, |session| {
            session.status = status;
            if status == RunStatus::Running {
                session.pending = None;
            }
            change(session);
        });
        if let Err(err) = result {
            warn!(run_id = %run_id, error = %err, "failed to update run session");
        }
    }
}

