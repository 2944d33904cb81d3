//! In-process collaborators for tests and for hosts that embed the engine
//! without external infrastructure.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use microfocus_storage::BrowsingContext;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::ports::{
    AlarmName, AlarmScheduler, Alert, AlertSink, Broadcaster, ContextSource, EngineEvent,
    Enforcement, EnforcementSink,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| anyhow!("lock poisoned: {e}"))
}

/// Scheduler that only records deadlines; the host (or a test) polls `due`
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    pending: Mutex<HashMap<AlarmName, DateTime<Utc>>>,
    offline: AtomicBool,
}

impl MemoryScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `schedule_once` fail, as for a host whose timer service is gone
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn pending(&self, name: AlarmName) -> Option<DateTime<Utc>> {
        lock(&self.pending).ok().and_then(|p| p.get(&name).copied())
    }

    /// Remove and return every alarm due at `now`, soonest first
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<AlarmName> {
        let Ok(mut pending) = lock(&self.pending) else {
            return Vec::new();
        };
        let mut due: Vec<(AlarmName, DateTime<Utc>)> = pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(name, at)| (*name, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        for (name, _) in &due {
            pending.remove(name);
        }
        due.into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl AlarmScheduler for MemoryScheduler {
    async fn schedule_once(&self, name: AlarmName, at: DateTime<Utc>) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("scheduler offline");
        }
        lock(&self.pending)?.insert(name, at);
        Ok(())
    }

    async fn cancel(&self, name: AlarmName) -> Result<()> {
        lock(&self.pending)?.remove(&name);
        Ok(())
    }
}

/// Fixed set of open contexts that tests mutate directly
#[derive(Debug, Default)]
pub struct MemoryContexts {
    contexts: Mutex<Vec<BrowsingContext>>,
    next_id: AtomicU64,
}

impl MemoryContexts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_contexts(contexts: Vec<BrowsingContext>) -> Self {
        Self {
            contexts: Mutex::new(contexts),
            next_id: AtomicU64::new(0),
        }
    }

    /// Insert or replace a context by id
    pub fn upsert(&self, context: BrowsingContext) {
        if let Ok(mut contexts) = lock(&self.contexts) {
            match contexts.iter_mut().find(|c| c.id == context.id) {
                Some(existing) => *existing = context,
                None => contexts.push(context),
            }
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        lock(&self.contexts).is_ok_and(|mut contexts| {
            let before = contexts.len();
            contexts.retain(|c| c.id != id);
            contexts.len() != before
        })
    }
}

#[async_trait]
impl ContextSource for MemoryContexts {
    async fn list_open_contexts(&self) -> Result<Vec<BrowsingContext>> {
        Ok(lock(&self.contexts)?.clone())
    }

    async fn get_context(&self, id: &str) -> Result<Option<BrowsingContext>> {
        Ok(lock(&self.contexts)?.iter().find(|c| c.id == id).cloned())
    }

    async fn open_context(&self, url: &str) -> Result<String> {
        let id = format!("restored-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.contexts)?.push(BrowsingContext::new(id.clone(), url));
        Ok(id)
    }
}

/// Records every verdict and alert it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    enforcements: Mutex<Vec<(String, Enforcement)>>,
    alerts: Mutex<Vec<Alert>>,
    unreachable: Mutex<HashSet<String>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `context_id` fail, as for a context without an overlay
    pub fn mark_unreachable(&self, context_id: &str) {
        if let Ok(mut unreachable) = lock(&self.unreachable) {
            unreachable.insert(context_id.to_string());
        }
    }

    #[must_use]
    pub fn enforcements(&self) -> Vec<(String, Enforcement)> {
        lock(&self.enforcements).map(|e| e.clone()).unwrap_or_default()
    }

    /// Most recent verdict delivered to `context_id`
    #[must_use]
    pub fn last_for(&self, context_id: &str) -> Option<Enforcement> {
        lock(&self.enforcements).ok().and_then(|e| {
            e.iter()
                .rev()
                .find(|(id, _)| id == context_id)
                .map(|(_, enforcement)| enforcement.clone())
        })
    }

    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EnforcementSink for RecordingSink {
    async fn deliver(&self, context_id: &str, enforcement: &Enforcement) -> Result<()> {
        if lock(&self.unreachable)?.contains(context_id) {
            bail!("context {context_id} is not reachable");
        }
        lock(&self.enforcements)?.push((context_id.to_string(), enforcement.clone()));
        Ok(())
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        lock(&self.alerts)?.push(alert.clone());
        Ok(())
    }
}

/// Broadcast channel fan-out; publishing with no listeners is not an error
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<EngineEvent>,
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, event: &EngineEvent) -> Result<()> {
        // A send error only means nobody is subscribed right now
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
