//! First-time setup: config file and database

use anyhow::{Context, Result};
use microfocus_core::{
    config::{config_path, get_data_dir},
    Config,
};
use microfocus_storage::Database;

/// Write a default config (if none exists) and create the database
///
/// # Errors
///
/// Returns an error if the data directory, config or database cannot be created
pub fn init_command() -> Result<()> {
    println!("Initializing MicroFocus...\n");

    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    let path = config_path()?;
    let config = if path.exists() {
        println!("Config already exists at: {}", path.display());
        Config::load(&path)?
    } else {
        let config = Config::default();
        config.save(&path)?;
        println!("Config written to: {}", path.display());
        config
    };

    let db_path = config
        .storage
        .database_path
        .clone()
        .unwrap_or_else(Database::default_db_path);
    Database::new(Some(db_path.clone()))?;
    println!("Database ready at: {}", db_path.display());

    println!("\nNext steps:");
    println!("  microfocus task add \"Write blog post\"");
    println!("  microfocus start <task id>");
    println!("  microfocus run      # keeps timers and break reminders firing");
    Ok(())
}
