use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use super::helpers::parse_json;
use super::Database;
use crate::store::{StateStore, StoreMap};

impl Database {
    /// Read every stored state entry
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored value is not valid JSON
    pub fn load_entries(&self) -> Result<StoreMap> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM entries")?;
        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let value = parse_json(&row.get::<_, String>(1)?)?;
                Ok((key, value))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read state entries")?;

        Ok(rows.into_iter().collect())
    }

    /// Upsert the given entries inside one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case
    pub fn store_entries(&self, entries: &StoreMap) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value.to_string(), now],
            )?;
        }
        tx.commit().context("Failed to commit state entries")?;
        log::debug!("Stored {} state entries", entries.len());
        Ok(())
    }
}

#[async_trait]
impl StateStore for Database {
    async fn get_all(&self) -> Result<StoreMap> {
        self.load_entries()
    }

    async fn set(&self, entries: StoreMap) -> Result<()> {
        self.store_entries(&entries)
    }
}
