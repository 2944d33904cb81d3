use super::*;
use crate::clock::ManualClock;
use crate::error::ErrorKind;
use crate::memory::{ChannelBroadcaster, MemoryContexts, MemoryScheduler, RecordingSink};
use crate::session::SessionPhase;
use chrono::TimeZone;
use microfocus_storage::MemoryStore;
use tokio::sync::broadcast;

struct Harness {
    manager: SessionManager,
    store: Arc<MemoryStore>,
    scheduler: Arc<MemoryScheduler>,
    contexts: Arc<MemoryContexts>,
    sink: Arc<RecordingSink>,
    broadcaster: Arc<ChannelBroadcaster>,
    clock: Arc<ManualClock>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
}

fn news() -> BrowsingContext {
    BrowsingContext::new("1", "https://news.example.com").with_title("Breaking News")
}

fn editor() -> BrowsingContext {
    BrowsingContext::new("2", "https://myblog.com/new-post").with_title("Editing my post")
}

fn harness_with(contexts: Vec<BrowsingContext>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let scheduler = Arc::new(MemoryScheduler::new());
    let contexts = Arc::new(MemoryContexts::with_contexts(contexts));
    let sink = Arc::new(RecordingSink::new());
    let broadcaster = Arc::new(ChannelBroadcaster::default());
    let clock = Arc::new(ManualClock::new(t0()));

    let ports = Collaborators {
        store: store.clone(),
        scheduler: scheduler.clone(),
        contexts: contexts.clone(),
        enforcement: sink.clone(),
        alerts: sink.clone(),
        broadcaster: broadcaster.clone(),
    };
    let manager = SessionManager::new(ports, clock.clone(), &Config::default());

    Harness {
        manager,
        store,
        scheduler,
        contexts,
        sink,
        broadcaster,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(Vec::new())
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn unrelated(title: &str) -> Enforcement {
    Enforcement::Denied {
        task_title: Some(title.to_string()),
        reason: DenyReason::Unrelated,
    }
}

// ============================================================================
// Activation
// ============================================================================

#[tokio::test]
async fn test_activate_unknown_task_is_not_found() {
    let h = harness();
    let err = h.manager.activate_task(uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_activate_starts_fresh_session() {
    let h = harness();
    let mut events = h.broadcaster.subscribe();
    let task = h.manager.create_task("Write blog post", "").await.unwrap();

    let session = h.manager.activate_task(task.id).await.unwrap();
    assert_eq!(session.task_id, task.id);
    assert_eq!(session.started_at, t0());
    assert_eq!(session.gate_bypasses + session.short_breaks + session.off_task, 0);

    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.active_task_id, Some(task.id));
    assert_eq!(state.current_session, Some(session));
    assert!(state.overrides.is_empty());

    assert_eq!(
        h.scheduler.pending(AlarmName::BreakReminder),
        Some(t0() + Duration::minutes(30))
    );
    assert!(h.scheduler.pending(AlarmName::SessionTimer).is_none());

    let alerts = h.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Zone activated");
    assert_eq!(alerts[0].message, "Focus mode: \"Write blog post\"");
    assert!(drain(&mut events).contains(&EngineEvent::StateUpdated));
}

#[tokio::test]
async fn test_activate_without_reminder_interval() {
    let h = harness();
    h.manager.set_break_reminder(0).await.unwrap();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_none());
}

#[tokio::test]
async fn test_activate_gates_open_contexts() {
    let h = harness_with(vec![news(), editor()]);
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    assert_eq!(h.sink.last_for("1"), Some(unrelated("Write blog post")));
    assert_eq!(h.sink.last_for("2"), Some(Enforcement::Allowed));
}

/// Records alerts and verdicts in one timeline
#[derive(Default)]
struct Timeline(std::sync::Mutex<Vec<String>>);

#[async_trait::async_trait]
impl EnforcementSink for Timeline {
    async fn deliver(&self, context_id: &str, _verdict: &Enforcement) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(format!("verdict:{context_id}"));
        Ok(())
    }
}

#[async_trait::async_trait]
impl AlertSink for Timeline {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(format!("alert:{}", alert.title));
        Ok(())
    }
}

#[tokio::test]
async fn test_activate_alerts_before_gating_contexts() {
    let timeline = Arc::new(Timeline::default());
    let ports = Collaborators {
        store: Arc::new(MemoryStore::new()),
        scheduler: Arc::new(MemoryScheduler::new()),
        contexts: Arc::new(MemoryContexts::with_contexts(vec![news()])),
        enforcement: timeline.clone(),
        alerts: timeline.clone(),
        broadcaster: Arc::new(ChannelBroadcaster::default()),
    };
    let manager = SessionManager::new(ports, Arc::new(ManualClock::new(t0())), &Config::default());

    let task = manager.create_task("Write blog post", "").await.unwrap();
    timeline.0.lock().unwrap().clear();
    manager.activate_task(task.id).await.unwrap();

    let events = timeline.0.lock().unwrap().clone();
    assert_eq!(events, vec!["alert:Zone activated".to_string(), "verdict:1".to_string()]);
}

#[tokio::test]
async fn test_activate_while_active_closes_previous_session() {
    let h = harness();
    let first = h.manager.create_task("First", "").await.unwrap();
    let second = h.manager.create_task("Second", "").await.unwrap();

    h.manager.activate_task(first.id).await.unwrap();
    h.clock.advance(Duration::minutes(12));
    h.manager.activate_task(second.id).await.unwrap();

    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.active_task_id, Some(second.id));
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].task_title, "First");
    assert_eq!(state.history[0].duration_minutes, 12);
    assert_eq!(state.history[0].finished_by, FinishedBy::Manual);
    assert_eq!(state.stats.total_sessions, 1);

    let titles: Vec<String> = h.sink.alerts().into_iter().map(|a| a.title).collect();
    assert_eq!(titles, vec!["Zone activated", "Zone activated"]);
}

// ============================================================================
// Deactivation
// ============================================================================

#[tokio::test]
async fn test_deactivate_without_session_is_noop() {
    let h = harness();
    assert!(h.manager.deactivate_task().await.unwrap().is_none());
    assert!(h.sink.alerts().is_empty());
}

#[tokio::test]
async fn test_deactivate_records_history_and_stats() {
    let h = harness_with(vec![news()]);
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.manager
        .decide_gate(Some("1"), GateDecision::Allow, None)
        .await
        .unwrap();
    h.manager.start_timer(Some(50)).await.unwrap();

    h.clock.advance(Duration::seconds(25 * 60 + 40));
    let entry = h.manager.deactivate_task().await.unwrap().unwrap();
    assert_eq!(entry.duration_minutes, 26);
    assert_eq!(entry.finished_by, FinishedBy::Manual);
    assert_eq!(entry.gate_bypasses, 1);
    assert_eq!(entry.allowed_research, 1);

    let state = h.manager.get_state().await.unwrap();
    assert!(state.current_session.is_none());
    assert!(state.active_task_id.is_none());
    assert!(state.overrides.is_empty());
    assert_eq!(state.history, vec![entry]);
    assert_eq!(state.stats.total_focus_time, 26);
    assert_eq!(state.stats.today_focus_time, 26);
    assert_eq!(state.stats.current_streak, 1);

    // Both alarms are gone
    assert!(h.scheduler.pending(AlarmName::SessionTimer).is_none());
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_none());

    // Contexts are released
    assert_eq!(h.sink.last_for("1"), Some(Enforcement::Allowed));

    let last = h.sink.alerts().pop().unwrap();
    assert_eq!(last.title, "Zone exited");
    assert_eq!(last.message, "Session ended: 26m on \"Write blog post\"");
}

#[tokio::test]
async fn test_streak_across_days() {
    let h = harness();
    let task = h.manager.create_task("Daily", "").await.unwrap();
    let mut streaks = Vec::new();
    for day in [0, 0, 1, 3] {
        h.clock.set(t0() + Duration::days(day));
        h.manager.activate_task(task.id).await.unwrap();
        h.clock.advance(Duration::minutes(10));
        h.manager.deactivate_task().await.unwrap();
        streaks.push(h.manager.get_state().await.unwrap().stats.current_streak);
    }
    assert_eq!(streaks, vec![1, 2, 1, 1]);

    let stats = h.manager.get_state().await.unwrap().stats;
    assert_eq!(stats.longest_streak, 2);
    assert_eq!(stats.total_focus_time, 40);
    assert_eq!(stats.today_focus_time, 10);
}

#[tokio::test]
async fn test_history_never_exceeds_limit() {
    let h = harness();
    let task = h.manager.create_task("Repeat", "").await.unwrap();
    for _ in 0..55 {
        h.manager.activate_task(task.id).await.unwrap();
        h.clock.advance(Duration::minutes(1));
        h.manager.deactivate_task().await.unwrap();
    }
    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.history.len(), 50);
    assert_eq!(state.stats.total_sessions, 55);
}

// ============================================================================
// Timer
// ============================================================================

#[tokio::test]
async fn test_start_timer_without_session() {
    let h = harness();
    let err = h.manager.start_timer(Some(10)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveSession);
}

#[tokio::test]
async fn test_start_timer_defaults_to_25_minutes() {
    let h = harness();
    let mut events = h.broadcaster.subscribe();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    let ends_at = h.manager.start_timer(None).await.unwrap();
    assert_eq!(ends_at, t0() + Duration::minutes(25));
    assert_eq!(h.manager.start_timer(Some(0)).await.unwrap(), ends_at);
    assert_eq!(h.scheduler.pending(AlarmName::SessionTimer), Some(ends_at));

    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.current_session.unwrap().timer_ends_at, Some(ends_at));
    assert!(drain(&mut events).contains(&EngineEvent::TimerStarted { ends_at }));
}

#[tokio::test]
async fn test_restarting_timer_replaces_deadline() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.manager.start_timer(Some(10)).await.unwrap();
    let ends_at = h.manager.start_timer(Some(45)).await.unwrap();
    assert_eq!(h.scheduler.pending(AlarmName::SessionTimer), Some(ends_at));
    assert_eq!(ends_at, t0() + Duration::minutes(45));
}

#[tokio::test]
async fn test_start_timer_scheduler_failure_leaves_session_untouched() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.scheduler.set_offline(true);

    let err = h.manager.start_timer(Some(10)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);

    let session = h.manager.get_state().await.unwrap().current_session.unwrap();
    assert!(session.timer_ends_at.is_none());
    assert_eq!(SessionPhase::of(Some(&session)), SessionPhase::Active);
}

#[tokio::test]
async fn test_start_timer_store_failure_keeps_previous_alarm() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    let first = h.manager.start_timer(Some(10)).await.unwrap();

    h.store.set_fail_writes(true);
    let err = h.manager.start_timer(Some(45)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert_eq!(h.scheduler.pending(AlarmName::SessionTimer), Some(first));

    h.store.set_fail_writes(false);
    let session = h.manager.get_state().await.unwrap().current_session.unwrap();
    assert_eq!(session.timer_ends_at, Some(first));
}

#[tokio::test]
async fn test_start_timer_store_failure_without_timer_disarms() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    h.store.set_fail_writes(true);
    assert!(h.manager.start_timer(Some(10)).await.is_err());
    assert!(h.scheduler.pending(AlarmName::SessionTimer).is_none());
}

#[tokio::test]
async fn test_stop_timer_right_after_activate() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    h.manager.stop_timer().await.unwrap();
    let session = h.manager.get_state().await.unwrap().current_session.unwrap();
    assert!(session.timer_ends_at.is_none());
}

#[tokio::test]
async fn test_stop_timer_keeps_session() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.manager.start_timer(Some(30)).await.unwrap();

    h.manager.stop_timer().await.unwrap();
    assert!(h.scheduler.pending(AlarmName::SessionTimer).is_none());
    let state = h.manager.get_state().await.unwrap();
    let session = state.current_session.unwrap();
    assert!(session.timer_ends_at.is_none());
    assert_eq!(state.active_task_id, Some(task.id));
}

#[tokio::test]
async fn test_stop_timer_when_idle_succeeds() {
    let h = harness();
    h.manager.stop_timer().await.unwrap();
    assert!(h.manager.get_state().await.unwrap().current_session.is_none());
}

// ============================================================================
// Gate decisions
// ============================================================================

#[tokio::test]
async fn test_gate_requires_context_id() {
    let h = harness();
    let err = h
        .manager
        .decide_gate(None, GateDecision::Allow, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingContext);

    let err = h
        .manager
        .decide_gate(Some(""), GateDecision::Allow, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingContext);
}

#[tokio::test]
async fn test_gate_takes_id_from_context() {
    let h = harness();
    let ctx = news();
    h.manager
        .decide_gate(None, GateDecision::Allow, Some(&ctx))
        .await
        .unwrap();
    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.overrides.get("1"), Some(&Override::Allow));
}

#[tokio::test]
async fn test_allow_then_evaluate_is_allowed() {
    let h = harness_with(vec![news()]);
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    assert_eq!(
        h.manager.evaluate_context("1", Some(news())).await.unwrap(),
        unrelated("Write blog post")
    );

    let verdict = h
        .manager
        .decide_gate(Some("1"), GateDecision::Allow, Some(&news()))
        .await
        .unwrap();
    assert_eq!(verdict, Enforcement::Allowed);

    h.clock.advance(Duration::hours(3));
    for _ in 0..3 {
        assert_eq!(
            h.manager.evaluate_context("1", Some(news())).await.unwrap(),
            Enforcement::Allowed
        );
    }

    let session = h.manager.get_state().await.unwrap().current_session.unwrap();
    assert_eq!(session.allowed_research, 1);
    assert_eq!(session.gate_bypasses, 1);
}

#[tokio::test]
async fn test_break_override_expires_strictly() {
    let h = harness_with(vec![news()]);
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    let verdict = h
        .manager
        .decide_gate(Some("1"), GateDecision::Break, None)
        .await
        .unwrap();
    let expires_at = t0() + Duration::minutes(5);
    assert_eq!(verdict, Enforcement::AllowedUntil { expires_at });
    assert_eq!(h.sink.last_for("1"), Some(verdict.clone()));

    h.clock.set(expires_at - Duration::milliseconds(1));
    assert_eq!(h.manager.evaluate_context("1", None).await.unwrap(), verdict);

    h.clock.set(expires_at + Duration::milliseconds(1));
    assert_eq!(
        h.manager.evaluate_context("1", None).await.unwrap(),
        unrelated("Write blog post")
    );
    let state = h.manager.get_state().await.unwrap();
    assert!(!state.overrides.contains_key("1"));
    assert_eq!(state.current_session.unwrap().short_breaks, 1);
}

#[tokio::test]
async fn test_block_and_off_task_are_denied() {
    let h = harness();
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    let blocked = h
        .manager
        .decide_gate(Some("7"), GateDecision::Block, None)
        .await
        .unwrap();
    assert_eq!(
        blocked,
        Enforcement::Denied {
            task_title: Some("Write blog post".to_string()),
            reason: DenyReason::BlockedByGate,
        }
    );

    let marked = h
        .manager
        .decide_gate(Some("7"), GateDecision::from("whatever"), None)
        .await
        .unwrap();
    assert!(matches!(
        marked,
        Enforcement::Denied {
            reason: DenyReason::MarkedOffTask,
            ..
        }
    ));

    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.current_session.unwrap().off_task, 2);
    assert!(state.overrides.is_empty());
}

#[tokio::test]
async fn test_gate_without_session_only_sets_override() {
    let h = harness();
    h.manager
        .decide_gate(Some("3"), GateDecision::Allow, None)
        .await
        .unwrap();
    let state = h.manager.get_state().await.unwrap();
    assert!(state.current_session.is_none());
    assert_eq!(state.overrides.len(), 1);
}

#[tokio::test]
async fn test_closed_context_drops_override() {
    let h = harness();
    h.manager
        .decide_gate(Some("3"), GateDecision::Allow, None)
        .await
        .unwrap();
    assert!(h.manager.on_context_closed("3").await.unwrap());
    assert!(!h.manager.on_context_closed("3").await.unwrap());
    assert!(h.manager.get_state().await.unwrap().overrides.is_empty());
}

// ============================================================================
// Evaluation
// ============================================================================

#[tokio::test]
async fn test_evaluate_without_task_allows() {
    let h = harness();
    assert_eq!(
        h.manager.evaluate_context("1", Some(news())).await.unwrap(),
        Enforcement::Allowed
    );
}

#[tokio::test]
async fn test_evaluate_with_stale_task_pointer_allows() {
    let h = harness();
    let mut state = EngineState::default();
    state.active_task_id = Some(uuid::Uuid::new_v4());
    let seeded = Arc::new(MemoryStore::with_state(&state).unwrap());
    let ports = Collaborators {
        store: seeded,
        scheduler: h.scheduler.clone(),
        contexts: h.contexts.clone(),
        enforcement: h.sink.clone(),
        alerts: h.sink.clone(),
        broadcaster: h.broadcaster.clone(),
    };
    let manager = SessionManager::new(ports, h.clock.clone(), &Config::default());
    assert_eq!(
        manager.evaluate_context("1", Some(news())).await.unwrap(),
        Enforcement::Allowed
    );
}

#[tokio::test]
async fn test_evaluate_closed_context_allows() {
    let h = harness();
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    assert_eq!(
        h.manager.evaluate_context("99", None).await.unwrap(),
        Enforcement::Allowed
    );
}

#[tokio::test]
async fn test_unreachable_context_is_not_an_error() {
    let h = harness_with(vec![news()]);
    h.sink.mark_unreachable("1");
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    assert_eq!(
        h.manager.evaluate_context("1", None).await.unwrap(),
        unrelated("Write blog post")
    );
    assert!(h.sink.last_for("1").is_none());
}

#[tokio::test]
async fn test_refresh_counts_open_contexts() {
    let h = harness_with(vec![news(), editor()]);
    assert_eq!(h.manager.refresh_all_contexts().await.unwrap(), 2);
}

// ============================================================================
// Alarms
// ============================================================================

#[tokio::test]
async fn test_timer_fire_closes_session() {
    let h = harness();
    let mut events = h.broadcaster.subscribe();
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    let ends_at = h.manager.start_timer(Some(25)).await.unwrap();

    h.clock.set(ends_at);
    let due = h.scheduler.due(h.clock.now());
    assert_eq!(due, vec![AlarmName::SessionTimer]);
    h.manager.handle_alarm(due[0]).await.unwrap();

    let state = h.manager.get_state().await.unwrap();
    assert!(state.current_session.is_none());
    assert!(state.active_task_id.is_none());
    let entry = state.history[0].clone();
    assert_eq!(entry.finished_by, FinishedBy::Timer);
    assert_eq!(entry.duration_minutes, 25);
    assert_eq!(state.stats.total_focus_time, 25);
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_none());

    assert!(drain(&mut events).contains(&EngineEvent::TimerFinished { session: entry }));
    let last = h.sink.alerts().pop().unwrap();
    assert_eq!(last.title, "Focus timer finished");
    assert_eq!(last.priority, AlertPriority::High);
    assert_eq!(last.message, "Great work! \"Write blog post\" session completed.");
}

#[tokio::test]
async fn test_timer_fire_after_manual_stop_is_noop() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.manager.deactivate_task().await.unwrap();

    assert!(h.manager.on_timer_fired().await.unwrap().is_none());
    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.stats.total_sessions, 1);
}

#[tokio::test]
async fn test_break_reminder_reschedules_while_active() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();

    h.clock.advance(Duration::minutes(30));
    let due = h.scheduler.due(h.clock.now());
    assert_eq!(due, vec![AlarmName::BreakReminder]);
    h.manager.handle_alarm(due[0]).await.unwrap();

    assert_eq!(
        h.scheduler.pending(AlarmName::BreakReminder),
        Some(t0() + Duration::minutes(60))
    );
    let last = h.sink.alerts().pop().unwrap();
    assert_eq!(last.title, "Break time suggested");
    assert_eq!(
        last.message,
        "You've been focused for 30 minutes. Take a quick break!"
    );
}

#[tokio::test]
async fn test_break_reminder_without_session_stops_chain() {
    let h = harness();
    assert!(h.manager.on_break_reminder().await.unwrap().is_none());
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_none());
    assert!(h.sink.alerts().is_empty());
}

#[tokio::test]
async fn test_deactivate_cancels_pending_reminder() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_some());

    h.clock.advance(Duration::minutes(10));
    h.manager.deactivate_task().await.unwrap();
    assert!(h.scheduler.due(t0() + Duration::hours(2)).is_empty());
}

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn test_created_tasks_are_prepended() {
    let h = harness();
    h.manager.create_task("First", "").await.unwrap();
    let second = h.manager.create_task("  Second  ", "notes").await.unwrap();
    let tasks = h.manager.get_state().await.unwrap().tasks;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, second.id);
    assert_eq!(tasks[0].title, "Second");
}

#[tokio::test]
async fn test_create_from_template() {
    let h = harness();
    let task = h.manager.create_task_from_template("research").await.unwrap();
    assert_eq!(task.title, "Research Session");
    assert_eq!(task.color.as_deref(), Some("#10b981"));

    let err = h.manager.create_task_from_template("gaming").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update_task() {
    let h = harness();
    let task = h.manager.create_task("Draft", "").await.unwrap();
    let updated = h
        .manager
        .update_task(
            task.id,
            TaskUpdate {
                notes: Some("chapter two".to_string()),
                color: Some(Some("#000000".to_string())),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Draft");
    assert_eq!(updated.notes, "chapter two");
    assert_eq!(updated.color.as_deref(), Some("#000000"));

    let err = h
        .manager
        .update_task(uuid::Uuid::new_v4(), TaskUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_active_task_clears_session() {
    let h = harness();
    let task = h.manager.create_task("Doomed", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.manager.start_timer(None).await.unwrap();
    h.manager
        .decide_gate(Some("4"), GateDecision::Allow, None)
        .await
        .unwrap();

    h.manager.delete_task(task.id).await.unwrap();
    let state = h.manager.get_state().await.unwrap();
    assert!(state.tasks.is_empty());
    assert!(state.current_session.is_none());
    assert!(state.active_task_id.is_none());
    assert!(state.overrides.is_empty());
    assert!(state.history.is_empty());
    assert!(h.scheduler.pending(AlarmName::SessionTimer).is_none());
    assert!(h.scheduler.pending(AlarmName::BreakReminder).is_none());

    let err = h.manager.delete_task(task.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_other_task_keeps_session() {
    let h = harness();
    let active = h.manager.create_task("Active", "").await.unwrap();
    let other = h.manager.create_task("Other", "").await.unwrap();
    h.manager.activate_task(active.id).await.unwrap();
    h.manager.delete_task(other.id).await.unwrap();
    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.active_task_id, Some(active.id));
    assert!(state.current_session.is_some());
}

#[tokio::test]
async fn test_capture_and_restore() {
    let mut blank = BrowsingContext::default();
    blank.id = "5".to_string();
    let h = harness_with(vec![news(), editor(), blank]);
    let task = h.manager.create_task("Write blog post", "").await.unwrap();

    let captured = h.manager.capture_tabs(task.id).await.unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].url, "https://news.example.com");
    assert_eq!(captured[0].title, "Breaking News");
    assert_eq!(captured[0].last_seen, t0());

    let stored = h.manager.get_state().await.unwrap();
    assert_eq!(stored.find_task(task.id).unwrap().captured, captured);

    assert_eq!(h.manager.restore_tabs(task.id).await.unwrap(), 2);
    let open = h.contexts.list_open_contexts().await.unwrap();
    assert_eq!(open.len(), 5);
    assert!(open.iter().any(|c| c.id == "restored-1"));
}

#[tokio::test]
async fn test_restore_without_snapshot_is_not_found() {
    let h = harness();
    let task = h.manager.create_task("Empty", "").await.unwrap();
    let err = h.manager.restore_tabs(task.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Settings, export, failures
// ============================================================================

#[tokio::test]
async fn test_preferences_are_persisted() {
    let h = harness();
    h.manager.set_theme(Theme::Dark).await.unwrap();
    h.manager.set_focus_goal(90).await.unwrap();
    h.manager.set_break_reminder(45).await.unwrap();

    let state = h.manager.get_state().await.unwrap();
    assert_eq!(state.theme, Theme::Dark);
    assert_eq!(state.focus_goal, 90);
    assert_eq!(state.break_reminder, 45);
}

#[tokio::test]
async fn test_export_history_lists_sessions() {
    let h = harness();
    let task = h.manager.create_task("Write blog post", "").await.unwrap();
    h.manager.activate_task(task.id).await.unwrap();
    h.clock.advance(Duration::minutes(20));
    h.manager.deactivate_task().await.unwrap();

    let text = h.manager.export_history().await.unwrap();
    assert!(text.contains("\"Write blog post\",\"2024-06-10T09:00:00.000Z\",20,0,0,0,\"manual\""));
    assert!(text.contains("Total Focus Time (min),20"));
}

#[tokio::test]
async fn test_store_failure_is_persistence_failure() {
    let h = harness();
    let task = h.manager.create_task("Focus", "").await.unwrap();
    h.store.set_fail_writes(true);

    let err = h.manager.activate_task(task.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(h.sink.alerts().is_empty());

    h.store.set_fail_writes(false);
    assert!(h.manager.get_state().await.unwrap().current_session.is_none());
}
