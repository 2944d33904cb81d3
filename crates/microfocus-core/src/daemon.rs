use anyhow::Result;
use microfocus_storage::Database;
use std::{sync::Arc, time::Duration};
use tokio::time::interval;

use crate::{clock::Clock, manager::SessionManager, sqlite::take_due};

/// Foreground loop that fires due alarms from the database
pub struct Daemon {
    manager: Arc<SessionManager>,
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    tick_interval_seconds: u64,
}

impl Daemon {
    #[must_use]
    pub fn new(
        manager: Arc<SessionManager>,
        database: Arc<Database>,
        clock: Arc<dyn Clock>,
        tick_interval_seconds: u64,
    ) -> Self {
        Self {
            manager,
            database,
            clock,
            tick_interval_seconds: tick_interval_seconds.max(1),
        }
    }

    /// Run until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed
    pub async fn run_with_signals(&self) -> Result<()> {
        let mut interval = interval(Duration::from_secs(self.tick_interval_seconds));
        log::info!(
            "Daemon started, checking alarms every {}s",
            self.tick_interval_seconds
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        log::error!("Daemon tick failed: {e:#}");
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Received Ctrl-C, shutting down...");
                    break;
                }
            }
        }

        log::info!("Daemon shut down gracefully.");
        Ok(())
    }

    /// Hand every due alarm to the engine, returning how many fired
    ///
    /// # Errors
    ///
    /// Returns an error if the alarm table cannot be read
    pub async fn tick(&self) -> Result<usize> {
        let due = take_due(&self.database, self.clock.now())?;
        let mut fired = 0;
        for name in due {
            match self.manager.handle_alarm(name).await {
                Ok(()) => fired += 1,
                Err(e) => log::error!("Failed to handle {name}: {e}"),
            }
        }
        Ok(fired)
    }
}
