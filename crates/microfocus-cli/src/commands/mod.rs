pub mod context;
pub mod daemon;
pub mod helpers;
pub mod history;
pub mod init;
pub mod session;
pub mod settings;
pub mod task;

use anyhow::{Context, Result};
use microfocus_core::{config::config_path, Collaborators, Config, SessionManager, SystemClock};
use microfocus_storage::Database;
use std::sync::Arc;

use crate::console::Console;

/// Engine wired to the on-disk database and the terminal
pub struct App {
    pub config: Config,
    pub database: Arc<Database>,
    pub manager: Arc<SessionManager>,
}

impl App {
    /// Load the config and open the database it points at
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the database cannot be opened
    pub fn open() -> Result<Self> {
        let config = Config::load(&config_path()?)?;
        let database = Arc::new(
            Database::new(config.storage.database_path.clone())
                .context("Failed to open database")?,
        );
        let ports = Collaborators {
            store: database.clone(),
            scheduler: database.clone(),
            contexts: database.clone(),
            enforcement: Arc::new(Console),
            alerts: Arc::new(Console),
            broadcaster: Arc::new(Console),
        };
        let manager = Arc::new(SessionManager::new(ports, Arc::new(SystemClock), &config));
        Ok(Self {
            config,
            database,
            manager,
        })
    }
}
