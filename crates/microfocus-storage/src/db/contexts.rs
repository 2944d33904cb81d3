use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::models::BrowsingContext;

fn context_from_row(row: &Row<'_>) -> rusqlite::Result<BrowsingContext> {
    Ok(BrowsingContext {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        pinned: row.get::<_, i32>(3)? != 0,
    })
}

impl Database {
    /// Record a context as open, or refresh its URL/title
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails
    pub fn upsert_context(&self, context: &BrowsingContext) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO contexts (id, url, title, pinned, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                url = ?2,
                title = ?3,
                pinned = ?4,
                updated_at = ?5",
            params![
                context.id,
                context.url,
                context.title,
                i32::from(context.pinned),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Forget a closed context, returning whether it was known
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub fn delete_context(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM contexts WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Every open context, most recently touched last
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn list_contexts(&self) -> Result<Vec<BrowsingContext>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, url, title, pinned FROM contexts ORDER BY updated_at, id")?;
        let contexts = stmt
            .query_map([], context_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contexts)
    }

    /// Look up one context by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn find_context(&self, id: &str) -> Result<Option<BrowsingContext>> {
        let conn = self.conn()?;
        let context = conn
            .query_row(
                "SELECT id, url, title, pinned FROM contexts WHERE id = ?1",
                params![id],
                context_from_row,
            )
            .optional()?;
        Ok(context)
    }
}
