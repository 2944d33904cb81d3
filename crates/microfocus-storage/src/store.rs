//! Durable key-value store contract and an in-memory implementation.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::models::{EngineState, StatePatch};

/// Top-level mapping persisted by a store
pub type StoreMap = Map<String, Value>;

/// Durable key-value storage the engine reads and writes.
///
/// No read-modify-write atomicity is promised across callers; the last
/// `set` wins for every key it carries.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read every stored entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read
    async fn get_all(&self) -> Result<StoreMap>;

    /// Write the given entries, leaving other keys untouched
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    async fn set(&self, entries: StoreMap) -> Result<()>;
}

/// Read the full engine state, filling gaps with defaults
///
/// # Errors
///
/// Returns an error if the store read fails or an entry is malformed
pub async fn load_state(store: &dyn StateStore) -> Result<EngineState> {
    EngineState::from_entries(store.get_all().await?)
}

/// Persist a partial update in a single `set` call
///
/// # Errors
///
/// Returns an error if serialization or the store write fails
pub async fn save_patch(store: &dyn StateStore, patch: StatePatch) -> Result<()> {
    let entries = patch.into_entries()?;
    if entries.is_empty() {
        return Ok(());
    }
    store.set(entries).await
}

/// Process-local store, used by tests and embedders without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<StoreMap>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a full state
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized
    pub fn with_state(state: &EngineState) -> Result<Self> {
        Ok(Self {
            entries: Mutex::new(state.to_entries()?),
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Make every subsequent `set` fail, simulating a broken backend
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the raw entries
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn snapshot(&self) -> Result<StoreMap> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| anyhow!("Failed to lock memory store: {e}"))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_all(&self) -> Result<StoreMap> {
        self.snapshot()
    }

    async fn set(&self, entries: StoreMap) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store is read-only");
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| anyhow!("Failed to lock memory store: {e}"))?;
        guard.extend(entries);
        Ok(())
    }
}
