/// History and export command handlers
use anyhow::{Context, Result};
use std::path::PathBuf;
use tabled::{Table, Tabled};

use super::helpers::{local_time, truncate_str};
use super::App;

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Minutes")]
    minutes: i64,
    #[tabled(rename = "Bypasses")]
    bypasses: u32,
    #[tabled(rename = "Breaks")]
    breaks: u32,
    #[tabled(rename = "Off-task")]
    off_task: u32,
    #[tabled(rename = "Finished by")]
    finished_by: String,
}

/// # Errors
///
/// Returns an error if the state cannot be read
pub async fn show_history(app: &App) -> Result<()> {
    let state = app.manager.get_state().await?;
    if state.history.is_empty() {
        println!("No sessions recorded yet");
        return Ok(());
    }

    let rows: Vec<HistoryRow> = state
        .history
        .iter()
        .map(|e| HistoryRow {
            task: truncate_str(&e.task_title, 40),
            started: local_time(e.started_at),
            minutes: e.duration_minutes,
            bypasses: e.gate_bypasses,
            breaks: e.short_breaks,
            off_task: e.off_task,
            finished_by: e.finished_by.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    println!(
        "\nTotal: {} min over {} sessions",
        state.stats.total_focus_time, state.stats.total_sessions
    );
    Ok(())
}

/// Write the history report to `output`, or stdout when not given
///
/// # Errors
///
/// Returns an error if the state cannot be read or the file cannot be written
pub async fn export(app: &App, output: Option<PathBuf>) -> Result<()> {
    let report = app.manager.export_history().await?;
    match output {
        Some(path) => {
            std::fs::write(&path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported history to {}", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}
