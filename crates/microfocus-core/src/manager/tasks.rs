use microfocus_storage::{CapturedContext, StatePatch, Task};
use std::collections::HashMap;
use uuid::Uuid;

use super::SessionManager;
use crate::error::{EngineError, EngineResult};
use crate::ports::{AlarmName, EngineEvent};
use crate::templates::find_template;

/// Fields of a task that can be edited; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub notes: Option<String>,
    /// `Some(None)` removes the colour
    pub color: Option<Option<String>>,
}

impl TaskUpdate {
    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(notes) = self.notes {
            task.notes = notes;
        }
        if let Some(color) = self.color {
            task.color = color;
        }
    }
}

impl SessionManager {
    /// Create a task and put it at the top of the list
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the store read or write fails
    pub async fn create_task(&self, title: &str, notes: &str) -> EngineResult<Task> {
        let task = Task::new(title.trim().to_string(), notes.to_string(), self.clock.now());
        self.insert_task(task).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown template id and `PersistenceFailure`
    /// if the store read or write fails
    pub async fn create_task_from_template(&self, template_id: &str) -> EngineResult<Task> {
        let template = find_template(template_id)
            .ok_or_else(|| EngineError::NotFound(format!("template '{template_id}'")))?;
        let mut task = Task::new(
            template.title.to_string(),
            template.notes.to_string(),
            self.clock.now(),
        );
        task.color = Some(template.color.to_string());
        self.insert_task(task).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task and `PersistenceFailure` if the
    /// store read or write fails
    pub async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> EngineResult<Task> {
        let mut tasks = self.load().await?.tasks;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id}")))?;
        update.apply(task);
        let updated = task.clone();

        self.save(StatePatch {
            tasks: Some(tasks),
            ..StatePatch::default()
        })
        .await?;
        self.publish(EngineEvent::StateUpdated).await;
        Ok(updated)
    }

    /// Delete a task. Deleting the active task drops its session without
    /// recording it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task and `PersistenceFailure` if the
    /// store read or write fails
    pub async fn delete_task(&self, task_id: Uuid) -> EngineResult<Task> {
        let state = self.load().await?;
        let mut tasks = state.tasks;
        let index = tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id}")))?;
        let removed = tasks.remove(index);

        let was_active = state.active_task_id == Some(task_id);
        let mut patch = StatePatch {
            tasks: Some(tasks),
            ..StatePatch::default()
        };
        if was_active {
            patch.active_task_id = Some(None);
            patch.current_session = Some(None);
            patch.overrides = Some(HashMap::new());
        }
        self.save(patch).await?;

        log::info!("Deleted task '{}' ({task_id})", removed.title);
        if was_active {
            self.cancel_alarm(AlarmName::SessionTimer).await;
            self.cancel_alarm(AlarmName::BreakReminder).await;
        }
        self.publish(EngineEvent::StateUpdated).await;
        if was_active {
            self.refresh_quietly().await;
        }
        Ok(removed)
    }

    /// Replace the task's snapshot with every open context that has a URL
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task and `PersistenceFailure` if the
    /// store or the context listing fails
    pub async fn capture_tabs(&self, task_id: Uuid) -> EngineResult<Vec<CapturedContext>> {
        let mut tasks = self.load().await?.tasks;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id}")))?;

        let now = self.clock.now();
        let open = self
            .ports
            .contexts
            .list_open_contexts()
            .await
            .map_err(EngineError::PersistenceFailure)?;
        let snapshot: Vec<CapturedContext> = open
            .into_iter()
            .filter_map(|context| {
                let url = context.url()?.to_string();
                Some(CapturedContext {
                    url,
                    title: context.title.unwrap_or_default(),
                    pinned: context.pinned,
                    last_seen: now,
                    scroll: None,
                })
            })
            .collect();
        task.captured.clone_from(&snapshot);

        self.save(StatePatch {
            tasks: Some(tasks),
            ..StatePatch::default()
        })
        .await?;
        log::info!("Captured {} contexts for task {task_id}", snapshot.len());
        self.publish(EngineEvent::StateUpdated).await;
        Ok(snapshot)
    }

    /// Re-open every captured context, returning how many opened
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task is unknown or has nothing captured, and
    /// `PersistenceFailure` if the store cannot be read
    pub async fn restore_tabs(&self, task_id: Uuid) -> EngineResult<usize> {
        let state = self.load().await?;
        let captured = state
            .find_task(task_id)
            .map(|t| t.captured.clone())
            .filter(|captured| !captured.is_empty())
            .ok_or_else(|| EngineError::NotFound(format!("captured contexts for task {task_id}")))?;

        let mut restored = 0;
        for context in &captured {
            match self.ports.contexts.open_context(&context.url).await {
                Ok(id) => {
                    log::debug!("Restored {} as context {id}", context.url);
                    restored += 1;
                }
                Err(e) => log::warn!("Failed to restore {}: {e:#}", context.url),
            }
        }
        log::info!("Restored {restored}/{} contexts", captured.len());
        Ok(restored)
    }

    async fn insert_task(&self, task: Task) -> EngineResult<Task> {
        let mut tasks = self.load().await?.tasks;
        tasks.insert(0, task.clone());
        self.save(StatePatch {
            tasks: Some(tasks),
            ..StatePatch::default()
        })
        .await?;
        log::info!("Created task '{}' ({})", task.title, task.id);
        self.publish(EngineEvent::StateUpdated).await;
        Ok(task)
    }
}
