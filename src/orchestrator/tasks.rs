//! Task table (§4.5). One unique task per computation request, mutated only
//! through the state-transition API so an invalid transition can never be observed.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{now_ms, AccountId, Task, TaskState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TaskState,
    pub to: TaskState,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot transition task from {:?} to {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

#[derive(Default)]
pub struct TaskTable {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue_task(&self, kind: impl Into<String>, consumer_agent_id: impl Into<String>, account_id: AccountId) -> Task {
        let task = Task {
            task_id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            consumer_agent_id: consumer_agent_id.into(),
            account_id,
            state: TaskState::Pending,
            created_at: now_ms(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.tasks.write().insert(task.task_id.clone(), task.clone());
        task
    }

    /// Allowed transitions: `pending -> in_progress -> {completed|failed}`,
    /// `pending -> failed`. Same-state transitions are no-ops.
    pub fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<Task, InvalidTransition> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(task_id).ok_or(InvalidTransition { from: TaskState::Pending, to: state })?;

        if task.state == state {
            return Ok(task.clone());
        }

        let allowed = matches!(
            (task.state, state),
            (TaskState::Pending, TaskState::InProgress)
                | (TaskState::Pending, TaskState::Failed)
                | (TaskState::InProgress, TaskState::Completed)
                | (TaskState::InProgress, TaskState::Failed)
        );
        if !allowed {
            return Err(InvalidTransition { from: task.state, to: state });
        }

        task.state = state;
        task.result = result.or_else(|| task.result.take());
        task.error = error.or_else(|| task.error.take());
        if matches!(state, TaskState::Completed | TaskState::Failed) {
            task.completed_at = Some(now_ms());
        }
        Ok(task.clone())
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().get(task_id).cloned()
    }
}
