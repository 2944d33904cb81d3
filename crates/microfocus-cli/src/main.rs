mod commands;
mod console;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    context::ContextAction, session::TimerAction, settings::SettingsAction, task::TaskAction, App,
};

#[derive(Parser)]
#[command(name = "microfocus")]
#[command(about = "Focus sessions that keep your browsing on task", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize microfocus (first-time setup)
    Init,
    /// Show the current session and today's statistics
    Status,
    /// Task management
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Start a focus session on a task
    Start {
        /// Task id or unique prefix
        task: String,
    },
    /// End the current focus session
    Stop,
    /// Session timer
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
    /// Open browsing contexts
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
    /// Answer the gate for a context: allow, break, block or off-task
    Gate {
        /// Context id
        context: String,
        decision: String,
    },
    /// Show finished sessions
    History,
    /// Export history and statistics as CSV
    Export {
        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run in the foreground, firing timers and break reminders
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    if matches!(cli.command, Commands::Init) {
        return commands::init::init_command();
    }

    let app = App::open()?;
    match cli.command {
        Commands::Init => Ok(()),
        Commands::Status => commands::session::show_status(&app).await,
        Commands::Task { action } => commands::task::handle_task_command(&app, action).await,
        Commands::Start { task } => commands::session::start_session(&app, &task).await,
        Commands::Stop => commands::session::stop_session(&app).await,
        Commands::Timer { action } => commands::session::handle_timer_command(&app, action).await,
        Commands::Context { action } => {
            commands::context::handle_context_command(&app, action).await
        }
        Commands::Gate { context, decision } => {
            commands::context::handle_gate_command(&app, &context, &decision).await
        }
        Commands::History => commands::history::show_history(&app).await,
        Commands::Export { output } => commands::history::export(&app, output).await,
        Commands::Settings { action } => {
            commands::settings::handle_settings_command(&app, action).await
        }
        Commands::Run => commands::daemon::run_daemon(&app).await,
    }
}
