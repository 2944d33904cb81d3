//! The focus session engine.
//!
//! Every operation follows the same shape: read the full state from the
//! store, mutate a copy, write back only the touched keys, then notify the
//! collaborators. Collaborator failures other than the store are logged and
//! swallowed.

mod alarms;
mod tasks;
#[cfg(test)]
mod tests;

pub use tasks::TaskUpdate;

use chrono::{DateTime, Duration, Utc};
use microfocus_storage::{
    load_state, save_patch, BrowsingContext, EngineState, FinishedBy, HistoryEntry, Override,
    Session, StatePatch, StateStore, Theme,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{Config, SessionConfig};
use crate::error::{EngineError, EngineResult};
use crate::overrides::{OverrideRegistry, Resolution};
use crate::ports::{
    AlarmName, AlarmScheduler, Alert, AlertPriority, AlertSink, Broadcaster, ContextSource,
    DenyReason, EngineEvent, Enforcement, EnforcementSink,
};
use crate::relevance::{KeywordRelevance, RelevanceEvaluator, RelevanceStrategy, Verdict};
use crate::report;
use crate::session::GateDecision;
use crate::stats::StatisticsAggregator;

/// Everything the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub scheduler: Arc<dyn AlarmScheduler>,
    pub contexts: Arc<dyn ContextSource>,
    pub enforcement: Arc<dyn EnforcementSink>,
    pub alerts: Arc<dyn AlertSink>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

/// Owns the session state machine and the gate decisions around it
pub struct SessionManager {
    ports: Collaborators,
    clock: Arc<dyn Clock>,
    evaluator: RelevanceEvaluator,
    aggregator: StatisticsAggregator,
    settings: SessionConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(ports: Collaborators, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let strategy = KeywordRelevance::with_threshold_ratio(config.relevance.threshold_ratio);
        Self {
            ports,
            clock,
            evaluator: RelevanceEvaluator::new(Box::new(strategy)),
            aggregator: StatisticsAggregator::new(config.session.history_limit),
            settings: config.session.clone(),
        }
    }

    /// Swap the relevance scoring strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn RelevanceStrategy>) -> Self {
        self.evaluator = RelevanceEvaluator::new(strategy);
        self
    }

    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store cannot be read
    pub async fn get_state(&self) -> EngineResult<EngineState> {
        self.load().await
    }

    /// Start a fresh session on `task_id`, replacing any running one
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task and `PersistenceFailure` if the
    /// store read or write fails
    pub async fn activate_task(&self, task_id: uuid::Uuid) -> EngineResult<Session> {
        let state = self.load().await?;
        let task = state
            .find_task(task_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id}")))?;
        let now = self.clock.now();

        let mut patch = StatePatch::default();
        if let Some(previous) = &state.current_session {
            log::info!("Closing session on '{}' before switching", previous.task_title);
            let mut history = state.history.clone();
            let mut stats = state.stats.clone();
            let entry = previous.finish(now, FinishedBy::Manual);
            self.aggregator
                .record_completion(&mut stats, entry.duration_minutes, self.clock.today());
            self.aggregator.record_history(&mut history, entry);
            patch.history = Some(history);
            patch.stats = Some(stats);
        }

        let session = Session::new(&task, now);
        patch.active_task_id = Some(Some(task.id));
        patch.current_session = Some(Some(session.clone()));
        patch.overrides = Some(HashMap::new());
        self.save(patch).await?;

        // Stale alarms must not leak into the new session
        self.cancel_alarm(AlarmName::SessionTimer).await;
        self.cancel_alarm(AlarmName::BreakReminder).await;
        if state.break_reminder > 0 {
            let at = now + Duration::minutes(i64::from(state.break_reminder));
            self.schedule_alarm(AlarmName::BreakReminder, at).await;
        }

        log::info!("Activated task '{}' ({})", task.title, task.id);
        self.publish(EngineEvent::StateUpdated).await;
        self.alert(Alert::new(
            "Zone activated",
            format!("Focus mode: \"{}\"", task.title),
            AlertPriority::Normal,
        ))
        .await;
        self.refresh_quietly().await;

        Ok(session)
    }

    /// End the running session by hand. Succeeds with `None` when idle.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn deactivate_task(&self) -> EngineResult<Option<HistoryEntry>> {
        let state = self.load().await?;
        let Some(entry) = self.close_session(state, FinishedBy::Manual).await? else {
            return Ok(None);
        };

        self.alert(Alert::new(
            "Zone exited",
            format!(
                "Session ended: {}m on \"{}\"",
                entry.duration_minutes, entry.task_title
            ),
            AlertPriority::Normal,
        ))
        .await;
        Ok(Some(entry))
    }

    /// Arm the session timer. Zero or missing minutes use the configured default.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveSession` when idle and `PersistenceFailure` if the
    /// store or the scheduler fails
    pub async fn start_timer(&self, minutes: Option<u32>) -> EngineResult<DateTime<Utc>> {
        let state = self.load().await?;
        let mut session = state.current_session.ok_or(EngineError::NoActiveSession)?;

        let minutes = minutes
            .filter(|m| *m > 0)
            .map_or(self.settings.default_timer_minutes, i64::from);
        let ends_at = self.clock.now() + Duration::minutes(minutes);
        let previous = session.timer_ends_at.replace(ends_at);

        // Arm first so a stored deadline always has an alarm behind it
        self.ports
            .scheduler
            .schedule_once(AlarmName::SessionTimer, ends_at)
            .await
            .map_err(EngineError::PersistenceFailure)?;
        if let Err(e) = self
            .save(StatePatch {
                current_session: Some(Some(session)),
                ..StatePatch::default()
            })
            .await
        {
            match previous {
                Some(at) => self.schedule_alarm(AlarmName::SessionTimer, at).await,
                None => self.cancel_alarm(AlarmName::SessionTimer).await,
            }
            return Err(e);
        }

        log::info!("Timer started for {minutes} minutes, ends at {ends_at}");
        self.publish(EngineEvent::TimerStarted { ends_at }).await;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(ends_at)
    }

    /// Disarm the session timer without ending the session
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn stop_timer(&self) -> EngineResult<()> {
        self.cancel_alarm(AlarmName::SessionTimer).await;

        let state = self.load().await?;
        if let Some(mut session) = state.current_session {
            session.timer_ends_at = None;
            self.save(StatePatch {
                current_session: Some(Some(session)),
                ..StatePatch::default()
            })
            .await?;
            log::info!("Timer stopped");
            self.publish(EngineEvent::StateUpdated).await;
        }
        Ok(())
    }

    /// Record the user's response to the gate overlay on one context.
    ///
    /// The context id is taken from `context_id`, falling back to the id of
    /// `context` when the caller only has the context itself.
    ///
    /// # Errors
    ///
    /// Returns `MissingContext` if no id can be resolved and
    /// `PersistenceFailure` if the store read or write fails
    pub async fn decide_gate(
        &self,
        context_id: Option<&str>,
        decision: GateDecision,
        context: Option<&BrowsingContext>,
    ) -> EngineResult<Enforcement> {
        let id = context_id
            .filter(|id| !id.is_empty())
            .or_else(|| context.map(|c| c.id.as_str()).filter(|id| !id.is_empty()))
            .ok_or(EngineError::MissingContext)?
            .to_string();

        let state = self.load().await?;
        let task_title = state.active_task().map(|t| t.title.clone());
        let mut registry = OverrideRegistry::from_map(state.overrides);
        let mut session = state.current_session;

        let enforcement = match decision {
            GateDecision::Allow => {
                registry.set(id.clone(), Override::Allow);
                Enforcement::Allowed
            }
            GateDecision::Break => {
                let expires_at = self.clock.now() + Duration::minutes(self.settings.break_minutes);
                registry.set(id.clone(), Override::Break { expires_at });
                Enforcement::AllowedUntil { expires_at }
            }
            GateDecision::Block => Enforcement::Denied {
                task_title,
                reason: DenyReason::BlockedByGate,
            },
            GateDecision::OffTask => Enforcement::Denied {
                task_title,
                reason: DenyReason::MarkedOffTask,
            },
        };
        if let Some(session) = session.as_mut() {
            decision.apply(session);
        }

        self.save(StatePatch {
            overrides: Some(registry.into_map()),
            current_session: session.map(Some),
            ..StatePatch::default()
        })
        .await?;

        log::info!("Gate decision '{decision}' on context {id}");
        self.deliver(&id, &enforcement).await;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(enforcement)
    }

    /// Decide whether `context_id` may stay open and tell it so.
    ///
    /// Safe to call redundantly: the only side effect besides delivery is
    /// purging an expired break override.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn evaluate_context(
        &self,
        context_id: &str,
        context: Option<BrowsingContext>,
    ) -> EngineResult<Enforcement> {
        let state = self.load().await?;
        let enforcement = self.verdict_for(&state, context_id, context).await?;
        log::debug!("Context {context_id}: {enforcement:?}");
        self.deliver(context_id, &enforcement).await;
        Ok(enforcement)
    }

    /// Re-evaluate every open context, returning how many were evaluated
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store cannot be read
    pub async fn refresh_all_contexts(&self) -> EngineResult<usize> {
        let contexts = match self.ports.contexts.list_open_contexts().await {
            Ok(contexts) => contexts,
            Err(e) => {
                log::warn!("Failed to list open contexts: {e:#}");
                return Ok(0);
            }
        };
        let mut evaluated = 0;
        for context in contexts {
            let id = context.id.clone();
            self.evaluate_context(&id, Some(context)).await?;
            evaluated += 1;
        }
        Ok(evaluated)
    }

    /// Forget the override of a context that was closed
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn on_context_closed(&self, context_id: &str) -> EngineResult<bool> {
        let state = self.load().await?;
        let mut registry = OverrideRegistry::from_map(state.overrides);
        if registry.remove(context_id).is_none() {
            return Ok(false);
        }
        self.save(StatePatch {
            overrides: Some(registry.into_map()),
            ..StatePatch::default()
        })
        .await?;
        log::debug!("Dropped override for closed context {context_id}");
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store write fails
    pub async fn set_theme(&self, theme: Theme) -> EngineResult<()> {
        self.save(StatePatch {
            theme: Some(theme),
            ..StatePatch::default()
        })
        .await?;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(())
    }

    /// Set the break reminder interval; 0 disables reminders for new sessions
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store write fails
    pub async fn set_break_reminder(&self, minutes: u32) -> EngineResult<()> {
        self.save(StatePatch {
            break_reminder: Some(minutes),
            ..StatePatch::default()
        })
        .await?;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store write fails
    pub async fn set_focus_goal(&self, minutes: u32) -> EngineResult<()> {
        self.save(StatePatch {
            focus_goal: Some(minutes),
            ..StatePatch::default()
        })
        .await?;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store cannot be read
    pub async fn export_history(&self) -> EngineResult<String> {
        let state = self.load().await?;
        Ok(report::export_history(&state.history, &state.stats))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn load(&self) -> EngineResult<EngineState> {
        load_state(self.ports.store.as_ref())
            .await
            .map_err(EngineError::PersistenceFailure)
    }

    async fn save(&self, patch: StatePatch) -> EngineResult<()> {
        save_patch(self.ports.store.as_ref(), patch)
            .await
            .map_err(EngineError::PersistenceFailure)
    }

    /// Fold the running session into history and statistics, clear it and
    /// both alarms, then re-gate every open context
    async fn close_session(
        &self,
        state: EngineState,
        finished_by: FinishedBy,
    ) -> EngineResult<Option<HistoryEntry>> {
        let Some(session) = state.current_session else {
            return Ok(None);
        };
        let entry = session.finish(self.clock.now(), finished_by);

        let mut history = state.history;
        let mut stats = state.stats;
        self.aggregator
            .record_completion(&mut stats, entry.duration_minutes, self.clock.today());
        self.aggregator.record_history(&mut history, entry.clone());

        self.save(StatePatch {
            active_task_id: Some(None),
            current_session: Some(None),
            history: Some(history),
            overrides: Some(HashMap::new()),
            stats: Some(stats),
            ..StatePatch::default()
        })
        .await?;

        self.cancel_alarm(AlarmName::SessionTimer).await;
        self.cancel_alarm(AlarmName::BreakReminder).await;

        log::info!(
            "Session on '{}' ended by {} after {} min",
            entry.task_title,
            finished_by,
            entry.duration_minutes
        );
        self.publish(EngineEvent::StateUpdated).await;
        self.refresh_quietly().await;
        Ok(Some(entry))
    }

    async fn verdict_for(
        &self,
        state: &EngineState,
        context_id: &str,
        context: Option<BrowsingContext>,
    ) -> EngineResult<Enforcement> {
        let Some(task) = state.active_task() else {
            // No task, or a pointer to a deleted one
            return Ok(Enforcement::Allowed);
        };

        let mut registry = OverrideRegistry::from_map(state.overrides.clone());
        match registry.resolve(context_id, self.clock.now()) {
            Resolution::Active(Override::Allow) => return Ok(Enforcement::Allowed),
            Resolution::Active(Override::Break { expires_at }) => {
                return Ok(Enforcement::AllowedUntil { expires_at })
            }
            Resolution::Expired => {
                log::debug!("Break override on {context_id} expired");
                self.save(StatePatch {
                    overrides: Some(registry.into_map()),
                    ..StatePatch::default()
                })
                .await?;
            }
            Resolution::Absent => {}
        }

        let context = match context {
            Some(context) => Some(context),
            None => self
                .ports
                .contexts
                .get_context(context_id)
                .await
                .unwrap_or_else(|e| {
                    log::warn!("Failed to look up context {context_id}: {e:#}");
                    None
                }),
        };
        let Some(context) = context else {
            return Ok(Enforcement::Allowed);
        };

        Ok(match self.evaluator.evaluate(&context, task) {
            Verdict::Allow => Enforcement::Allowed,
            Verdict::Deny => Enforcement::Denied {
                task_title: Some(task.title.clone()),
                reason: DenyReason::Unrelated,
            },
        })
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh_all_contexts().await {
            log::warn!("Failed to refresh open contexts: {e}");
        }
    }

    async fn deliver(&self, context_id: &str, enforcement: &Enforcement) {
        if let Err(e) = self.ports.enforcement.deliver(context_id, enforcement).await {
            log::warn!("Could not deliver verdict to context {context_id}: {e:#}");
        }
    }

    async fn alert(&self, alert: Alert) {
        if let Err(e) = self.ports.alerts.notify(&alert).await {
            log::warn!("Failed to show alert '{}': {e:#}", alert.title);
        }
    }

    async fn publish(&self, event: EngineEvent) {
        if let Err(e) = self.ports.broadcaster.publish(&event).await {
            log::warn!("Failed to broadcast event: {e:#}");
        }
    }

    async fn schedule_alarm(&self, name: AlarmName, at: DateTime<Utc>) {
        if let Err(e) = self.ports.scheduler.schedule_once(name, at).await {
            log::warn!("Failed to schedule {name}: {e:#}");
        }
    }

    async fn cancel_alarm(&self, name: AlarmName) {
        if let Err(e) = self.ports.scheduler.cancel(name).await {
            log::warn!("Failed to cancel {name}: {e:#}");
        }
    }
}
