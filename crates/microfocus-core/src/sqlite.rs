//! Port implementations over the SQLite database, used by the CLI host.
//!
//! Alarms are rows polled by the daemon; contexts are whatever the host has
//! registered as open.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use microfocus_storage::{BrowsingContext, Database};
use uuid::Uuid;

use crate::ports::{AlarmName, AlarmScheduler, ContextSource};

#[async_trait]
impl AlarmScheduler for Database {
    async fn schedule_once(&self, name: AlarmName, at: DateTime<Utc>) -> Result<()> {
        self.upsert_alarm(name.as_str(), at)
    }

    async fn cancel(&self, name: AlarmName) -> Result<()> {
        self.delete_alarm(name.as_str()).map(|_| ())
    }
}

#[async_trait]
impl ContextSource for Database {
    async fn list_open_contexts(&self) -> Result<Vec<BrowsingContext>> {
        self.list_contexts()
    }

    async fn get_context(&self, id: &str) -> Result<Option<BrowsingContext>> {
        self.find_context(id)
    }

    async fn open_context(&self, url: &str) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        self.upsert_context(&BrowsingContext::new(id.clone(), url))?;
        Ok(id)
    }
}

/// Fired alarms the engine knows about; unknown names are logged and dropped
///
/// # Errors
///
/// Returns an error if the alarm table cannot be read
pub fn take_due(database: &Database, now: DateTime<Utc>) -> Result<Vec<AlarmName>> {
    let mut due = Vec::new();
    for alarm in database.take_due_alarms(now)? {
        match alarm.name.parse::<AlarmName>() {
            Ok(name) => due.push(name),
            Err(e) => log::warn!("Skipping alarm: {e}"),
        }
    }
    Ok(due)
}
