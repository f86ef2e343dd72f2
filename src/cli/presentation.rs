//! CLI presentation: turn engine results and sessions into terminal text.

use crate::executor::RunOutcome;
use crate::session::RunSession;
use comfy_table::Table;
use std::path::Path;

const PREMISE_WIDTH: usize = 48;

pub fn format_outcome(outcome: &RunOutcome, artifact_root: &Path) -> String {
    match outcome {
        RunOutcome::Completed { final_cut, record } => format!(
            "Run {} completed: {} scene(s), {} shot(s)\nFinal cut: {}",
            record.run_id,
            record.scenes.len(),
            record.shot_count(),
            artifact_root.join(final_cut.as_str()).display()
        ),
        RunOutcome::Suspended { token, prompt } => format!(
            "Run {} is waiting for story approval (revision {}).\n\n{}\n\n{}\n\nContinue with:\n  reelsmith resume {} --approve\n  reelsmith resume {} --reject \"<feedback>\"",
            token.run_id,
            token.revision,
            prompt.story.trim(),
            prompt.message,
            token.run_id,
            token.run_id
        ),
    }
}

pub fn format_sessions(sessions: &[RunSession]) -> String {
    if sessions.is_empty() {
        return "No runs recorded.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Run", "Status", "Premise", "Updated", "Final Cut"]);
    for session in sessions {
        let final_cut = session
            .final_cut
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            session.run_id.clone(),
            session.status.as_str().to_string(),
            truncate(&session.premise, PREMISE_WIDTH),
            session.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            final_cut,
        ]);
    }
    table.to_string()
}

pub fn format_session_detail(session: &RunSession) -> String {
    let mut lines = vec![
        format!("Run:      {}", session.run_id),
        format!("Status:   {}", session.status.as_str()),
        format!("Premise:  {}", session.premise),
        format!("Started:  {}", session.started_at.to_rfc3339()),
        format!("Updated:  {}", session.updated_at.to_rfc3339()),
    ];
    if let Some(token) = &session.pending {
        lines.push(format!(
            "Pending:  story revision {} (resume at {})",
            token.revision,
            token.resume_at.as_str()
        ));
    }
    if let Some(final_cut) = &session.final_cut {
        lines.push(format!("Final:    {}", final_cut));
    }
    if let Some(error) = &session.last_error {
        lines.push(format!("Error:    {}", error));
    }
    lines.join("\n")
}

fn truncate(text: &str, width: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    let cut: String = single_line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
