use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::helpers::from_millis;
use super::Database;
use crate::models::PendingAlarm;

impl Database {
    /// Schedule `name` to fire at `fire_at`, replacing any earlier deadline
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails
    pub fn upsert_alarm(&self, name: &str, fire_at: DateTime<Utc>) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO alarms (name, fire_at) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET fire_at = ?2",
            params![name, fire_at.timestamp_millis()],
        )?;
        Ok(())
    }

    /// Remove a pending alarm, returning whether one existed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub fn delete_alarm(&self, name: &str) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM alarms WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    /// All pending alarms, soonest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn pending_alarms(&self) -> Result<Vec<PendingAlarm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, fire_at FROM alarms ORDER BY fire_at")?;
        let alarms = stmt
            .query_map([], |row| {
                Ok(PendingAlarm {
                    name: row.get(0)?,
                    fire_at: from_millis(row.get(1)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    /// Remove and return every alarm due at `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the query or delete fails
    pub fn take_due_alarms(&self, now: DateTime<Utc>) -> Result<Vec<PendingAlarm>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let cutoff = now.timestamp_millis();
        let mut due = Vec::new();
        {
            let mut stmt =
                tx.prepare("SELECT name, fire_at FROM alarms WHERE fire_at <= ?1 ORDER BY fire_at")?;
            let rows = stmt.query_map(params![cutoff], |row| {
                Ok(PendingAlarm {
                    name: row.get(0)?,
                    fire_at: from_millis(row.get(1)?)?,
                })
            })?;
            for alarm in rows {
                due.push(alarm?);
            }
        }
        tx.execute("DELETE FROM alarms WHERE fire_at <= ?1", params![cutoff])?;
        tx.commit().context("Failed to commit due alarms")?;
        Ok(due)
    }
}
