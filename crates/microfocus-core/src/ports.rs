//! Contracts for the collaborators the engine drives.
//!
//! Storage lives in `microfocus-storage`; everything else the host provides
//! through these traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use microfocus_storage::{BrowsingContext, HistoryEntry};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The two independently scheduled triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmName {
    SessionTimer,
    BreakReminder,
}

impl AlarmName {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionTimer => "microfocus-timer",
            Self::BreakReminder => "microfocus-break-reminder",
        }
    }
}

impl fmt::Display for AlarmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "microfocus-timer" => Ok(Self::SessionTimer),
            "microfocus-break-reminder" => Ok(Self::BreakReminder),
            other => anyhow::bail!("unknown alarm: {other}"),
        }
    }
}

/// Why a context is being denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DenyReason {
    Unrelated,
    BlockedByGate,
    MarkedOffTask,
}

impl DenyReason {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Unrelated => "Looks unrelated to the active Zone",
            Self::BlockedByGate => "Blocked by MicroFocus gate",
            Self::MarkedOffTask => "Marked as off-task",
        }
    }
}

/// Verdict delivered to a context for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum Enforcement {
    Allowed,
    /// Permitted until the break override runs out
    AllowedUntil { expires_at: DateTime<Utc> },
    Denied {
        task_title: Option<String>,
        reason: DenyReason,
    },
}

impl Enforcement {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// User-facing alert priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub priority: AlertPriority,
}

impl Alert {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>, priority: AlertPriority) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
        }
    }
}

/// Events announced to listening surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    StateUpdated,
    TimerStarted { ends_at: DateTime<Utc> },
    TimerFinished { session: HistoryEntry },
}

/// Deferred-timer scheduler, one pending deadline per name
#[async_trait]
pub trait AlarmScheduler: Send + Sync {
    /// Schedule `name` for `at`, replacing any pending deadline with that name
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler rejects the request
    async fn schedule_once(&self, name: AlarmName, at: DateTime<Utc>) -> Result<()>;

    /// Drop the pending deadline for `name`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler rejects the request
    async fn cancel(&self, name: AlarmName) -> Result<()>;
}

/// Enumeration of open browsing contexts
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the host cannot enumerate contexts
    async fn list_open_contexts(&self) -> Result<Vec<BrowsingContext>>;

    /// # Errors
    ///
    /// Returns an error if the host lookup fails; a closed context is `Ok(None)`
    async fn get_context(&self, id: &str) -> Result<Option<BrowsingContext>>;

    /// Open a new context at `url`, returning its id
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses to open it
    async fn open_context(&self, url: &str) -> Result<String>;
}

/// Delivers verdicts to contexts. Failures are swallowed by the engine.
#[async_trait]
pub trait EnforcementSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the context is not reachable
    async fn deliver(&self, context_id: &str, enforcement: &Enforcement) -> Result<()>;
}

/// Fire-and-forget user notifications
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the notification could not be shown
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Fire-and-forget fan-out to UI surfaces
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the channel is unavailable
    async fn publish(&self, event: &EngineEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_name_roundtrip() {
        for name in [AlarmName::SessionTimer, AlarmName::BreakReminder] {
            assert_eq!(name.as_str().parse::<AlarmName>().unwrap(), name);
        }
        assert!("something-else".parse::<AlarmName>().is_err());
    }

    #[test]
    fn test_enforcement_allowed_flags() {
        assert!(Enforcement::Allowed.is_allowed());
        assert!(Enforcement::AllowedUntil {
            expires_at: Utc::now()
        }
        .is_allowed());
        assert!(!Enforcement::Denied {
            task_title: None,
            reason: DenyReason::MarkedOffTask,
        }
        .is_allowed());
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(EngineEvent::StateUpdated).unwrap();
        assert_eq!(json["type"], "stateUpdated");
    }
}
