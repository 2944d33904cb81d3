//! Focus session commands: start, stop, timer and status

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use microfocus_core::{Clock, SessionPhase, SystemClock};

use super::helpers::{local_time, short_id};
use super::task::task_id;
use super::App;

#[derive(Subcommand, Debug)]
pub enum TimerAction {
    /// Arm the session timer
    Start {
        /// Duration in minutes (defaults to the configured length)
        minutes: Option<u32>,
    },
    /// Disarm the session timer, keeping the session running
    Stop,
}

/// # Errors
///
/// Returns an error if the task is unknown or the engine fails
pub async fn start_session(app: &App, task: &str) -> Result<()> {
    let id = task_id(app, task).await?;
    let session = app.manager.activate_task(id).await?;
    println!(
        "Focusing on \"{}\" since {}",
        session.task_title,
        local_time(session.started_at)
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the engine fails
pub async fn stop_session(app: &App) -> Result<()> {
    match app.manager.deactivate_task().await? {
        Some(entry) => println!(
            "Stopped \"{}\" after {} min ({} bypasses, {} breaks, {} off-task)",
            entry.task_title,
            entry.duration_minutes,
            entry.gate_bypasses,
            entry.short_breaks,
            entry.off_task
        ),
        None => println!("No active session"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if there is no session or the engine fails
pub async fn handle_timer_command(app: &App, action: TimerAction) -> Result<()> {
    match action {
        TimerAction::Start { minutes } => {
            let ends_at = app.manager.start_timer(minutes).await?;
            println!("Timer running until {}", local_time(ends_at));
            println!("Keep `microfocus run` open to be notified when it ends.");
        }
        TimerAction::Stop => {
            app.manager.stop_timer().await?;
            println!("Timer stopped");
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the state cannot be read
pub async fn show_status(app: &App) -> Result<()> {
    let state = app.manager.get_state().await?;
    let now = Utc::now();

    println!("MicroFocus Status");
    println!("{}", "-".repeat(40));

    match state.current_session.as_ref() {
        None => println!("Session:     none"),
        Some(session) => {
            println!(
                "Session:     \"{}\" ({})",
                session.task_title,
                short_id(session.task_id)
            );
            println!(
                "Elapsed:     {} min since {}",
                session.elapsed_minutes(now),
                local_time(session.started_at)
            );
            if let SessionPhase::ActiveWithTimer { ends_at } =
                SessionPhase::of(state.current_session.as_ref())
            {
                let left = (ends_at - now).num_minutes().max(0);
                println!("Timer:       ends {} ({left} min left)", local_time(ends_at));
            }
            println!(
                "Gate:        {} allowed, {} breaks, {} off-task",
                session.allowed_research, session.short_breaks, session.off_task
            );
            println!("Overrides:   {}", state.overrides.len());
        }
    }

    println!(
        "Today:       {} / {} min",
        state.stats.today_focus(SystemClock.today()),
        state.focus_goal
    );
    println!(
        "Streak:      {} (longest {})",
        state.stats.current_streak, state.stats.longest_streak
    );
    println!(
        "Reminders:   {}",
        if state.break_reminder > 0 {
            format!("every {} min", state.break_reminder)
        } else {
            "off".to_string()
        }
    );
    println!("Theme:       {}", state.theme.as_str());
    Ok(())
}
