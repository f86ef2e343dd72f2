//! CLI domain: parse, route, output, and presentation only.
//! Orchestration lives in the engine; routes just translate commands into calls.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_outcome, format_session_detail, format_sessions};
pub use route::RunContext;
