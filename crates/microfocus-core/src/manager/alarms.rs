use chrono::{DateTime, Duration, Utc};
use microfocus_storage::{FinishedBy, HistoryEntry};

use super::SessionManager;
use crate::error::EngineResult;
use crate::ports::{AlarmName, Alert, AlertPriority, EngineEvent};

impl SessionManager {
    /// Dispatch a fired alarm to its handler
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn handle_alarm(&self, name: AlarmName) -> EngineResult<()> {
        log::info!("Alarm fired: {name}");
        match name {
            AlarmName::SessionTimer => self.on_timer_fired().await.map(|_| ()),
            AlarmName::BreakReminder => self.on_break_reminder().await.map(|_| ()),
        }
    }

    /// Close the running session as finished by the timer. A session that was
    /// already closed makes this a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn on_timer_fired(&self) -> EngineResult<Option<HistoryEntry>> {
        let state = self.load().await?;
        let Some(entry) = self.close_session(state, FinishedBy::Timer).await? else {
            log::debug!("Timer fired without a session");
            return Ok(None);
        };

        self.publish(EngineEvent::TimerFinished {
            session: entry.clone(),
        })
        .await;
        self.alert(Alert::new(
            "Focus timer finished",
            format!("Great work! \"{}\" session completed.", entry.task_title),
            AlertPriority::High,
        ))
        .await;
        Ok(Some(entry))
    }

    /// Nudge the user and queue the next reminder. Without a session the
    /// chain stops; returns the next reminder time when one was scheduled.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store cannot be read
    pub async fn on_break_reminder(&self) -> EngineResult<Option<DateTime<Utc>>> {
        let state = self.load().await?;
        let (Some(session), Some(_)) = (&state.current_session, state.active_task_id) else {
            log::debug!("Break reminder fired without a session");
            return Ok(None);
        };

        let now = self.clock.now();
        let elapsed = session.elapsed_minutes(now);
        self.alert(Alert::new(
            "Break time suggested",
            format!("You've been focused for {elapsed} minutes. Take a quick break!"),
            AlertPriority::Normal,
        ))
        .await;

        if state.break_reminder == 0 {
            log::info!("Break reminders disabled, not rescheduling");
            return Ok(None);
        }
        let next = now + Duration::minutes(i64::from(state.break_reminder));
        self.schedule_alarm(AlarmName::BreakReminder, next).await;
        Ok(Some(next))
    }
}
