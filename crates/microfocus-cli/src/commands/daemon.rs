use anyhow::Result;
use microfocus_core::{Daemon, SystemClock};
use std::sync::Arc;

use super::App;

/// Run the alarm loop in the foreground until Ctrl-C
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed
pub async fn run_daemon(app: &App) -> Result<()> {
    let daemon = Daemon::new(
        app.manager.clone(),
        app.database.clone(),
        Arc::new(SystemClock),
        app.config.daemon.tick_seconds,
    );

    // Catch up on anything that came due while nothing was running
    let fired = daemon.tick().await?;
    if fired > 0 {
        log::info!("Fired {fired} overdue alarms");
    }

    println!("MicroFocus is running. Press Ctrl-C to stop.");
    daemon.run_with_signals().await
}
