use anyhow::{anyhow, Result};
use clap::Subcommand;
use microfocus_storage::Theme;

use super::App;

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Break reminder interval in minutes (0 turns reminders off)
    Reminder { minutes: u32 },
    /// Daily focus goal in minutes
    Goal { minutes: u32 },
    /// Theme: system, light or dark
    Theme { theme: String },
}

/// # Errors
///
/// Returns an error if the value is invalid or the store write fails
pub async fn handle_settings_command(app: &App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Reminder { minutes } => {
            app.manager.set_break_reminder(minutes).await?;
            if minutes == 0 {
                println!("Break reminders turned off");
            } else {
                println!("Break reminder every {minutes} min (from the next session)");
            }
        }
        SettingsAction::Goal { minutes } => {
            app.manager.set_focus_goal(minutes).await?;
            println!("Daily focus goal set to {minutes} min");
        }
        SettingsAction::Theme { theme } => {
            let parsed = Theme::parse(&theme)
                .ok_or_else(|| anyhow!("Unknown theme '{theme}'. Use system, light or dark"))?;
            app.manager.set_theme(parsed).await?;
            println!("Theme set to {}", parsed.as_str());
        }
    }
    Ok(())
}
