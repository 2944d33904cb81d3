use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::models::EngineState;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Entries table - one JSON document per top-level state key
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Alarms table - at most one pending deadline per name
    conn.execute(
        "CREATE TABLE IF NOT EXISTS alarms (
            name TEXT PRIMARY KEY,
            fire_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_alarms_fire_at ON alarms(fire_at)",
        [],
    )?;

    // Contexts table - browsing contexts the host reports as open
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            url TEXT,
            title TEXT,
            pinned INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Seed the default state on first open
///
/// # Errors
///
/// Returns an error if the count query or any insert fails
pub fn insert_default_state(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }

    let now = Utc::now().to_rfc3339();
    for (key, value) in EngineState::default().to_entries()? {
        conn.execute(
            "INSERT OR IGNORE INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value.to_string(), now],
        )?;
    }

    log::info!("Seeded default engine state");
    Ok(())
}
