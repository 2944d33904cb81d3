//! Browsing context commands. The CLI host keeps open contexts in the
//! database; the engine is told about every change.

use anyhow::{bail, Result};
use clap::Subcommand;
use microfocus_core::GateDecision;
use microfocus_storage::BrowsingContext;
use tabled::{Table, Tabled};

use super::helpers::truncate_str;
use super::App;
use crate::console::describe;

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// Register a newly opened context and gate it
    Open {
        url: String,
        #[arg(short, long)]
        title: Option<String>,
        /// Context id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        pinned: bool,
    },
    /// Navigate an open context and gate it again
    Update {
        id: String,
        url: String,
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Close a context
    Close { id: String },
    /// List open contexts
    List,
    /// Re-evaluate one context, or all when no id is given
    Check { id: Option<String> },
}

#[derive(Tabled)]
struct ContextRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Pinned")]
    pinned: bool,
}

/// # Errors
///
/// Returns an error if the database or the engine fails
pub async fn handle_context_command(app: &App, action: ContextAction) -> Result<()> {
    match action {
        ContextAction::Open {
            url,
            title,
            id,
            pinned,
        } => {
            let id = id.unwrap_or_else(|| {
                uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
            });
            let mut context = BrowsingContext::new(id, url);
            context.title = title;
            context.pinned = pinned;
            gate(app, context).await?;
        }
        ContextAction::Update { id, url, title } => {
            let Some(mut context) = app.database.find_context(&id)? else {
                bail!("Context {id} is not open");
            };
            context.url = Some(url);
            context.title = title;
            gate(app, context).await?;
        }
        ContextAction::Close { id } => {
            let closed = app.database.delete_context(&id)?;
            app.manager.on_context_closed(&id).await?;
            if closed {
                println!("Closed context {id}");
            } else {
                println!("Context {id} was not open");
            }
        }
        ContextAction::List => {
            let rows: Vec<ContextRow> = app
                .database
                .list_contexts()?
                .into_iter()
                .map(|c| ContextRow {
                    url: truncate_str(c.url().unwrap_or("-"), 50),
                    title: truncate_str(c.title.as_deref().unwrap_or_default(), 30),
                    pinned: c.pinned,
                    id: c.id,
                })
                .collect();
            if rows.is_empty() {
                println!("No open contexts");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        ContextAction::Check { id: Some(id) } => {
            let enforcement = app.manager.evaluate_context(&id, None).await?;
            println!("{id}: {}", describe(&enforcement));
        }
        ContextAction::Check { id: None } => {
            let count = app.manager.refresh_all_contexts().await?;
            println!("Re-evaluated {count} contexts");
        }
    }
    Ok(())
}

/// Record the user's gate decision for a context
///
/// # Errors
///
/// Returns an error if the engine fails
pub async fn handle_gate_command(app: &App, id: &str, decision: &str) -> Result<()> {
    let context = app.database.find_context(id)?;
    let decision = GateDecision::from(decision);
    let enforcement = app
        .manager
        .decide_gate(Some(id), decision, context.as_ref())
        .await?;
    println!("{id} ({decision}): {}", describe(&enforcement));
    Ok(())
}

async fn gate(app: &App, context: BrowsingContext) -> Result<()> {
    app.database.upsert_context(&context)?;
    let id = context.id.clone();
    let enforcement = app.manager.evaluate_context(&id, Some(context)).await?;
    println!("{id}: {}", describe(&enforcement));
    Ok(())
}
