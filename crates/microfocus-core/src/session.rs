use chrono::{DateTime, Utc};
use microfocus_storage::Session;
use serde::Serialize;
use std::fmt;

/// Where the single session currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SessionPhase {
    Absent,
    Active,
    ActiveWithTimer { ends_at: DateTime<Utc> },
}

impl SessionPhase {
    #[must_use]
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            None => Self::Absent,
            Some(Session {
                timer_ends_at: Some(ends_at),
                ..
            }) => Self::ActiveWithTimer { ends_at: *ends_at },
            Some(_) => Self::Active,
        }
    }
}

/// User response to the gate overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateDecision {
    /// Keep the context for the rest of the session
    Allow,
    /// Five-minute excursion
    Break,
    Block,
    /// Explicit off-task acknowledgement; also the fallback for unknown input
    OffTask,
}

impl GateDecision {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Break => "break",
            Self::Block => "block",
            Self::OffTask => "off-task",
        }
    }

    /// Bump the session counters this decision affects
    pub fn apply(self, session: &mut Session) {
        match self {
            Self::Allow => {
                session.allowed_research += 1;
                session.gate_bypasses += 1;
            }
            Self::Break => session.short_breaks += 1,
            Self::Block | Self::OffTask => session.off_task += 1,
        }
    }
}

impl From<&str> for GateDecision {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "allow" => Self::Allow,
            "break" => Self::Break,
            "block" => Self::Block,
            _ => Self::OffTask,
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
