use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::store::StoreMap;

/// Scroll position recorded when a context was captured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: i64,
    pub y: i64,
}

/// One browsing context remembered as part of a task snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedContext {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pinned: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollOffset>,
}

/// A persistent focus target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Ordered snapshot of captured contexts
    #[serde(default, rename = "tabs")]
    pub captured: Vec<CapturedContext>,
}

impl Task {
    #[must_use]
    pub fn new(title: String, notes: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            notes,
            color: None,
            created_at,
            captured: Vec::new(),
        }
    }

    /// Text the relevance heuristic extracts keywords from
    #[must_use]
    pub fn keyword_source(&self) -> String {
        format!("{} {}", self.title, self.notes)
    }
}

/// An open browsing location as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowsingContext {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl BrowsingContext {
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            title: None,
            pinned: false,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// URL with empty strings treated as missing
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

/// How a session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishedBy {
    Manual,
    Timer,
}

impl FinishedBy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for FinishedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single active focus run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub task_id: Uuid,
    /// Denormalized so history survives task deletion
    pub task_title: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gate_bypasses: u32,
    #[serde(default)]
    pub short_breaks: u32,
    #[serde(default)]
    pub off_task: u32,
    #[serde(default)]
    pub allowed_research: u32,
}

impl Session {
    /// Start a fresh session bound to `task` with all counters at zero
    #[must_use]
    pub fn new(task: &Task, started_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task.id,
            task_title: task.title.clone(),
            started_at,
            timer_ends_at: None,
            gate_bypasses: 0,
            short_breaks: 0,
            off_task: 0,
            allowed_research: 0,
        }
    }

    /// Elapsed time in whole minutes, rounded half up. Clock skew yields zero.
    #[must_use]
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        let millis = (now - self.started_at).num_milliseconds().max(0);
        (millis + 30_000) / 60_000
    }

    /// Convert into an immutable history record
    #[must_use]
    pub fn finish(&self, ended_at: DateTime<Utc>, finished_by: FinishedBy) -> HistoryEntry {
        HistoryEntry {
            task_id: self.task_id,
            task_title: self.task_title.clone(),
            started_at: self.started_at,
            ended_at,
            duration_minutes: self.elapsed_minutes(ended_at),
            gate_bypasses: self.gate_bypasses,
            short_breaks: self.short_breaks,
            off_task: self.off_task,
            allowed_research: self.allowed_research,
            finished_by,
        }
    }
}

/// Immutable record of a closed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub task_id: Uuid,
    pub task_title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub gate_bypasses: u32,
    #[serde(default)]
    pub short_breaks: u32,
    #[serde(default)]
    pub off_task: u32,
    #[serde(default)]
    pub allowed_research: u32,
    pub finished_by: FinishedBy,
}

/// Per-context exception within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Override {
    /// Permanent for the rest of the session
    Allow,
    /// Temporary, treated as absent once `expires_at` has passed
    Break {
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },
}

impl Override {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::Break { expires_at } if *expires_at <= now)
    }
}

/// Cumulative focus statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Statistics {
    pub total_focus_time: i64,
    pub total_sessions: u32,
    pub longest_streak: u32,
    pub current_streak: u32,
    pub last_session_date: Option<NaiveDate>,
    pub today_focus_time: i64,
}

impl Statistics {
    /// Minutes focused on `today`. A total left over from an earlier date reads as zero.
    #[must_use]
    pub fn today_focus(&self, today: NaiveDate) -> i64 {
        if self.last_session_date == Some(today) {
            self.today_focus_time
        } else {
            0
        }
    }
}

/// Presentation theme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "system" => Some(Self::System),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// A deferred trigger waiting in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlarm {
    pub name: String,
    pub fire_at: DateTime<Utc>,
}

pub const DEFAULT_BREAK_REMINDER_MINUTES: u32 = 30;
pub const DEFAULT_FOCUS_GOAL_MINUTES: u32 = 120;

/// Everything the engine persists, keyed the same way in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineState {
    pub tasks: Vec<Task>,
    pub active_task_id: Option<Uuid>,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    pub current_session: Option<Session>,
    pub overrides: HashMap<String, Override>,
    pub theme: Theme,
    /// Break reminder interval in minutes, 0 disables
    pub break_reminder: u32,
    pub focus_goal: u32,
    pub stats: Statistics,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            active_task_id: None,
            history: Vec::new(),
            current_session: None,
            overrides: HashMap::new(),
            theme: Theme::System,
            break_reminder: DEFAULT_BREAK_REMINDER_MINUTES,
            focus_goal: DEFAULT_FOCUS_GOAL_MINUTES,
            stats: Statistics::default(),
        }
    }
}

impl EngineState {
    /// Overlay stored entries on the default state
    ///
    /// # Errors
    ///
    /// Returns an error if a stored entry does not match the expected shape
    pub fn from_entries(entries: StoreMap) -> Result<Self> {
        let mut merged = Self::default().to_entries()?;
        merged.extend(entries);
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// Full mapping of this state, one entry per top-level key
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_entries(&self) -> Result<StoreMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => bail!("engine state serialized to non-object: {other}"),
        }
    }

    #[must_use]
    pub fn find_task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Task the active pointer refers to, `None` when unset or stale
    #[must_use]
    pub fn active_task(&self) -> Option<&Task> {
        self.active_task_id.and_then(|id| self.find_task(id))
    }
}

/// Partial update written back to the store. Only `Some` fields are written;
/// `Some(None)` writes an explicit null.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session: Option<Option<Session>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<HashMap<String, Override>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_reminder: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_goal: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Statistics>,
}

impl StatePatch {
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn into_entries(self) -> Result<StoreMap> {
        match serde_json::to_value(&self)? {
            Value::Object(map) => Ok(map),
            other => bail!("state patch serialized to non-object: {other}"),
        }
    }
}
