//! Task management commands

use anyhow::Result;
use clap::Subcommand;
use microfocus_core::{templates::TEMPLATES, TaskUpdate};
use tabled::{Table, Tabled};

use super::helpers::{local_time, resolve_task, short_id, truncate_str};
use super::App;

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Create a task
    Add {
        title: String,
        /// Extra words that describe the work, used for relevance matching
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Create a task from a template
    Template {
        /// Template id (see `task templates`)
        id: String,
    },
    /// List available templates
    Templates,
    /// List all tasks
    List,
    /// Edit a task
    Edit {
        /// Task id or unique prefix
        task: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        /// Colour tag, e.g. "#0ea5e9"; an empty string removes it
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Delete a task
    Delete {
        /// Task id or unique prefix
        task: String,
    },
    /// Save the currently open contexts into a task
    Capture {
        /// Task id or unique prefix
        task: String,
    },
    /// Re-open the contexts captured for a task
    Restore {
        /// Task id or unique prefix
        task: String,
    },
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Notes")]
    notes: String,
    #[tabled(rename = "Captured")]
    captured: usize,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Active")]
    active: String,
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: &'static str,
    #[tabled(rename = "Title")]
    title: &'static str,
    #[tabled(rename = "Notes")]
    notes: &'static str,
}

/// Handle task commands
///
/// # Errors
///
/// Returns an error if the task cannot be resolved or the engine fails
pub async fn handle_task_command(app: &App, action: TaskAction) -> Result<()> {
    match action {
        TaskAction::Add { title, notes } => {
            let task = app.manager.create_task(&title, &notes).await?;
            println!("Created task {} \"{}\"", short_id(task.id), task.title);
        }
        TaskAction::Template { id } => {
            let task = app.manager.create_task_from_template(&id).await?;
            println!("Created task {} \"{}\"", short_id(task.id), task.title);
        }
        TaskAction::Templates => {
            let rows: Vec<TemplateRow> = TEMPLATES
                .iter()
                .map(|t| TemplateRow {
                    id: t.id,
                    title: t.title,
                    notes: t.notes,
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        TaskAction::List => list_tasks(app).await?,
        TaskAction::Edit {
            task,
            title,
            notes,
            color,
        } => {
            let id = task_id(app, &task).await?;
            let update = TaskUpdate {
                title,
                notes,
                color: color.map(|c| Some(c).filter(|c| !c.is_empty())),
            };
            let task = app.manager.update_task(id, update).await?;
            println!("Updated task {} \"{}\"", short_id(task.id), task.title);
        }
        TaskAction::Delete { task } => {
            let id = task_id(app, &task).await?;
            let removed = app.manager.delete_task(id).await?;
            println!("Deleted task \"{}\"", removed.title);
        }
        TaskAction::Capture { task } => {
            let id = task_id(app, &task).await?;
            let captured = app.manager.capture_tabs(id).await?;
            println!("Captured {} contexts:", captured.len());
            for context in captured {
                println!("  {}", truncate_str(&context.url, 70));
            }
        }
        TaskAction::Restore { task } => {
            let id = task_id(app, &task).await?;
            let restored = app.manager.restore_tabs(id).await?;
            println!("Restored {restored} contexts");
        }
    }
    Ok(())
}

/// Resolve a task argument against the stored tasks
///
/// # Errors
///
/// Returns an error if the state cannot be read or the reference is unknown
pub async fn task_id(app: &App, reference: &str) -> Result<uuid::Uuid> {
    let state = app.manager.get_state().await?;
    resolve_task(&state.tasks, reference)
}

async fn list_tasks(app: &App) -> Result<()> {
    let state = app.manager.get_state().await?;
    if state.tasks.is_empty() {
        println!("No tasks yet. Create one with: microfocus task add \"<title>\"");
        return Ok(());
    }

    let rows: Vec<TaskRow> = state
        .tasks
        .iter()
        .map(|t| TaskRow {
            id: short_id(t.id),
            title: truncate_str(&t.title, 40),
            notes: truncate_str(&t.notes, 40),
            captured: t.captured.len(),
            created: local_time(t.created_at),
            active: if state.active_task_id == Some(t.id) {
                "*".to_string()
            } else {
                String::new()
            },
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
