//! Reelsmith: resumable premise-to-video production
//!
//! A fixed graph of stages turns a premise into a story, characters, scripts,
//! storyboards, key frames, shot videos and finally one assembled cut. Every
//! unit of work is keyed and memoized in a persistent artifact store, so an
//! interrupted run picks up exactly where it stopped. Production pauses once,
//! after story development, until someone approves or rejects the story.

pub mod approval;
pub mod assemble;
pub mod camera_tree;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod memo;
pub mod prompts;
pub mod provider;
pub mod record;
pub mod reference;
pub mod session;
pub mod stages;
pub mod store;
pub mod types;

pub use approval::{ApprovalPrompt, ApprovalState, ContinuationToken, Decision};
pub use error::{PipelineError, StorageError};
pub use executor::{PipelineEngine, RunOutcome};
pub use record::{ProductionRecord, RunInputs};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use types::ArtifactKey;
