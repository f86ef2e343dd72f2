//! CLI route: single route table from commands to engine calls.

use crate::approval::{ApprovalPrompt, Decision};
use crate::assemble::FfmpegConcatenator;
use crate::cli::parse::Commands;
use crate::cli::presentation::{format_outcome, format_session_detail, format_sessions};
use crate::config::{ConfigLoader, ReelConfig};
use crate::executor::{PipelineEngine, RunOutcome};
use crate::provider::HttpGenerationService;
use crate::record::RunInputs;
use crate::session::RunSessionStore;
use crate::store::FsArtifactStore;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

pub struct RunContext {
    workspace_root: PathBuf,
    config: ReelConfig,
    artifact_root: PathBuf,
    sessions: RunSessionStore,
    runtime: Runtime,
}

impl RunContext {
    /// Load configuration and open the session index. The provider is only
    /// built when a command actually generates something.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root).context("loading configuration")?,
        };
        let config = config.validated()?;

        let artifact_root = config.storage.artifact_root(&workspace_root);
        let sessions_dir = config.storage.sessions_dir(&workspace_root);
        std::fs::create_dir_all(&sessions_dir)
            .with_context(|| format!("creating {}", sessions_dir.display()))?;
        let sessions = RunSessionStore::open(&sessions_dir)?;
        let runtime = Runtime::new().context("starting async runtime")?;

        Ok(Self {
            workspace_root,
            config,
            artifact_root,
            sessions,
            runtime,
        })
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Run {
                premise,
                premise_file,
                constraints,
                style,
                auto_approve,
                interactive,
            } => {
                let premise = match (premise, premise_file) {
                    (Some(text), _) => text.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)
                        .with_context(|| format!("reading premise from {}", path.display()))?,
                    (None, None) => bail!("a premise or --premise-file is required"),
                };
                if premise.trim().is_empty() {
                    bail!("the premise is empty");
                }
                let inputs = RunInputs::new(premise.trim(), constraints.as_str(), style.as_str());
                self.handle_run(inputs, *auto_approve, *interactive)
            }
            Commands::Resume {
                run_id,
                approve,
                reject,
            } => {
                let decision = match (approve, reject) {
                    (true, _) => Decision::approve(),
                    (false, Some(feedback)) => Decision::reject(feedback.as_str()),
                    (false, None) => bail!("pass --approve or --reject <feedback>"),
                };
                self.handle_resume(run_id, decision)
            }
            Commands::Status { run_id, format } => self.handle_status(run_id.as_deref(), format),
        }
    }

    fn engine(&self, auto_approve: bool) -> Result<PipelineEngine> {
        let service = HttpGenerationService::new(self.config.provider.clone())?;
        std::fs::create_dir_all(&self.artifact_root)
            .with_context(|| format!("creating {}", self.artifact_root.display()))?;
        let store = FsArtifactStore::new(&self.artifact_root)?;
        let mut settings = self.config.pipeline.clone();
        settings.auto_approve |= auto_approve;
        Ok(PipelineEngine::new(
            Arc::new(service),
            Arc::new(store),
            Arc::new(FfmpegConcatenator::default()),
            settings,
        )
        .with_sessions(self.sessions.clone()))
    }

    fn handle_run(&self, inputs: RunInputs, auto_approve: bool, interactive: bool) -> Result<String> {
        let engine = self.engine(auto_approve)?;
        let mut outcome = self.runtime.block_on(engine.run(inputs))?;
        if interactive {
            while let RunOutcome::Suspended { token, prompt } = &outcome {
                let decision = ask_for_decision(prompt)?;
                let token = token.clone();
                info!(run_id = %token.run_id, approved = decision.approved, "decision entered interactively");
                outcome = self.runtime.block_on(engine.resume(&token, decision))?;
            }
        }
        Ok(format_outcome(&outcome, &self.artifact_root))
    }

    fn handle_resume(&self, run_id: &str, decision: Decision) -> Result<String> {
        let engine = self.engine(false)?;
        let Some(pending) = engine.pending(run_id)? else {
            bail!("run {} is not waiting for a story decision", run_id);
        };
        let outcome = self
            .runtime
            .block_on(engine.resume(&pending.token, decision))?;
        Ok(format_outcome(&outcome, &self.artifact_root))
    }

    fn handle_status(&self, run_id: Option<&str>, format: &str) -> Result<String> {
        match run_id {
            Some(run_id) => {
                let Some(session) = self.sessions.get(run_id)? else {
                    bail!("no run named {}", run_id);
                };
                if format == "json" {
                    return Ok(serde_json::to_string_pretty(&session)?);
                }
                Ok(format_session_detail(&session))
            }
            None => {
                let sessions = self.sessions.list()?;
                if format == "json" {
                    return Ok(serde_json::to_string_pretty(&sessions)?);
                }
                Ok(format_sessions(&sessions))
            }
        }
    }
}

fn ask_for_decision(prompt: &ApprovalPrompt) -> Result<Decision> {
    use dialoguer::{Confirm, Input};

    println!("\n--- Story (revision {}) ---\n{}\n", prompt.revision, prompt.story.trim());
    let approved = Confirm::new()
        .with_prompt("Approve this story?")
        .default(true)
        .interact()?;
    if approved {
        return Ok(Decision::approve());
    }
    let feedback: String = Input::new()
        .with_prompt("What should change in the next draft?")
        .interact_text()?;
    Ok(Decision::reject(feedback))
}
