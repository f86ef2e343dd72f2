//! CLI parse: clap types for reelsmith. No behavior; definitions only.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Reelsmith CLI - resumable premise-to-video production
#[derive(Parser)]
#[command(name = "reelsmith")]
#[command(about = "Turn a premise into a finished video, one memoized stage at a time")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a run, or continue the run these inputs already identify
    #[command(group(ArgGroup::new("source").required(true).args(["premise", "premise_file"])))]
    Run {
        /// Premise text
        premise: Option<String>,
        /// Read the premise from a file
        #[arg(long)]
        premise_file: Option<PathBuf>,
        /// Production constraints (length, audience, ...)
        #[arg(long, default_value = "")]
        constraints: String,
        /// Visual style applied to portraits and frames
        #[arg(long, default_value = "")]
        style: String,
        /// Approve every story draft without asking
        #[arg(long)]
        auto_approve: bool,
        /// Ask for the story decision on the terminal instead of suspending
        #[arg(long, conflicts_with = "auto_approve")]
        interactive: bool,
    },
    /// Decide on the story a suspended run is waiting on and continue it
    #[command(group(ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
    Resume {
        /// Run id printed when the run suspended
        run_id: String,
        /// Approve the pending story
        #[arg(long)]
        approve: bool,
        /// Reject the pending story with feedback for the next draft
        #[arg(long, value_name = "FEEDBACK")]
        reject: Option<String>,
    },
    /// List runs, or show one run in detail
    Status {
        /// Run id to show
        run_id: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
