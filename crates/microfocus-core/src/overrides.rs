use chrono::{DateTime, Utc};
use microfocus_storage::Override;
use std::collections::HashMap;

/// What the registry says about a context right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A valid override that short-circuits relevance scoring
    Active(Override),
    /// A break ran out and was purged; fall through to scoring
    Expired,
    Absent,
}

/// Per-context exceptions for the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideRegistry {
    entries: HashMap<String, Override>,
}

impl OverrideRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(entries: HashMap<String, Override>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn into_map(self) -> HashMap<String, Override> {
        self.entries
    }

    #[must_use]
    pub fn get(&self, context_id: &str) -> Option<Override> {
        self.entries.get(context_id).copied()
    }

    pub fn set(&mut self, context_id: impl Into<String>, exception: Override) {
        self.entries.insert(context_id.into(), exception);
    }

    /// Remove the entry if it is a break that has run out; returns true when purged
    pub fn clear_expired(&mut self, context_id: &str, now: DateTime<Utc>) -> bool {
        match self.entries.get(context_id) {
            Some(exception) if exception.is_expired(now) => {
                self.entries.remove(context_id);
                true
            }
            _ => false,
        }
    }

    /// Look up a context, lazily purging an expired break
    pub fn resolve(&mut self, context_id: &str, now: DateTime<Utc>) -> Resolution {
        if self.clear_expired(context_id, now) {
            return Resolution::Expired;
        }
        self.get(context_id)
            .map_or(Resolution::Absent, Resolution::Active)
    }

    pub fn remove(&mut self, context_id: &str) -> Option<Override> {
        self.entries.remove(context_id)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
