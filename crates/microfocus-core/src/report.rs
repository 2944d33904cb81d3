//! Plain-text history export.

use chrono::SecondsFormat;
use microfocus_storage::{HistoryEntry, Statistics};
use std::fmt::Write;

const HEADER: &str = "Task Title,Start Time,Duration (min),Gates Bypassed,Breaks,Off-Task,Finished By";

/// Quote a field, doubling embedded quotes
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render history rows followed by the cumulative statistics block
#[must_use]
pub fn export_history(history: &[HistoryEntry], stats: &Statistics) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for entry in history {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            quoted(&entry.task_title),
            quoted(&entry.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            entry.duration_minutes,
            entry.gate_bypasses,
            entry.short_breaks,
            entry.off_task,
            quoted(entry.finished_by.as_str()),
        );
    }

    out.push_str("\nOverall Statistics\n");
    let _ = writeln!(out, "Total Focus Time (min),{}", stats.total_focus_time);
    let _ = writeln!(out, "Total Sessions,{}", stats.total_sessions);
    let _ = writeln!(out, "Current Streak (days),{}", stats.current_streak);
    let _ = writeln!(out, "Longest Streak (days),{}", stats.longest_streak);
    out
}
