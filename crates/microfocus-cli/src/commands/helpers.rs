//! Helper utility functions for CLI commands

use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use microfocus_storage::Task;
use uuid::Uuid;

/// Safely truncate a string to a maximum number of characters (not bytes).
/// This avoids panics when slicing multi-byte UTF-8 characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Resolve a full task id or a unique id prefix
pub fn resolve_task(tasks: &[Task], reference: &str) -> Result<Uuid> {
    let reference = reference.trim().to_lowercase();
    if let Ok(id) = Uuid::parse_str(&reference) {
        return Ok(id);
    }
    if reference.is_empty() {
        bail!("Task id must not be empty");
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id.to_string().starts_with(&reference))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id),
        [] => bail!("No task matches '{reference}'"),
        _ => bail!(
            "'{reference}' is ambiguous ({} tasks match); use a longer prefix",
            matches.len()
        ),
    }
}

/// First eight characters of an id, as shown in listings
pub fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
