//! Task board: the collaborator the timer credits completed work intervals
//! to, plus the usual add/complete/clear management around it.
//!
//! The timer only ever uses two calls -- [`TaskStore::active_task_id`] and
//! [`TaskStore::increment_completed_intervals`] -- everything else serves
//! the task UI.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::migrations::{load_persisted_state, save_persisted_state, TASKS_STORE_KEY};
use crate::storage::SafeStorage;

/// Longest stored task title, in characters. Longer input is truncated, not
/// rejected.
const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    /// Work intervals the user estimated this task needs.
    pub est_pomodoros: u32,
    /// Work intervals actually completed while this task was active.
    pub act_pomodoros: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub active_task_id: Option<Uuid>,
}

const TASKS_SCHEMA_VERSION: u32 = 0;

/// Write-through task store.
pub struct TaskStore {
    storage: Arc<SafeStorage>,
    state: Mutex<TaskState>,
}

impl TaskStore {
    pub fn load(storage: Arc<SafeStorage>) -> Self {
        let state =
            load_persisted_state::<TaskState>(&storage, TASKS_STORE_KEY).unwrap_or_default();
        Self {
            storage,
            state: Mutex::new(state),
        }
    }

    /// Add a task and return its id. The title is trimmed and truncated to
    /// [`MAX_TITLE_LEN`] characters.
    pub fn add_task(&self, title: &str, est_pomodoros: u32) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.lock();
        state.tasks.push(Task {
            id,
            title: title.trim().chars().take(MAX_TITLE_LEN).collect(),
            completed: false,
            est_pomodoros,
            act_pomodoros: 0,
        });
        self.persist(&state);
        id
    }

    /// Remove a task. If it was the active one, nothing is active afterwards.
    pub fn delete_task(&self, id: Uuid) {
        let mut state = self.lock();
        state.tasks.retain(|t| t.id != id);
        if state.active_task_id == Some(id) {
            state.active_task_id = None;
        }
        self.persist(&state);
    }

    pub fn toggle_task(&self, id: Uuid) {
        let mut state = self.lock();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.completed = !task.completed;
        }
        self.persist(&state);
    }

    pub fn set_active_task(&self, id: Option<Uuid>) {
        let mut state = self.lock();
        state.active_task_id = id;
        self.persist(&state);
    }

    pub fn active_task_id(&self) -> Option<Uuid> {
        self.lock().active_task_id
    }

    /// Credit one completed work interval to a task.
    pub fn increment_completed_intervals(&self, id: Uuid) {
        let mut state = self.lock();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.act_pomodoros += 1;
        }
        self.persist(&state);
    }

    pub fn clear_tasks(&self) {
        let mut state = self.lock();
        state.tasks.clear();
        state.active_task_id = None;
        self.persist(&state);
    }

    /// Drop completed tasks, deactivating the active one if it was completed.
    pub fn clear_completed_tasks(&self) {
        let mut state = self.lock();
        let active_completed = state
            .active_task_id
            .and_then(|id| state.tasks.iter().find(|t| t.id == id))
            .is_some_and(|t| t.completed);
        if active_completed {
            state.active_task_id = None;
        }
        state.tasks.retain(|t| !t.completed);
        self.persist(&state);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn snapshot(&self) -> TaskState {
        self.lock().clone()
    }

    /// Replace the whole state (backup import). The caller has already
    /// validated the document.
    pub fn replace(&self, new_state: TaskState) {
        let mut state = self.lock();
        *state = new_state;
        self.persist(&state);
    }

    fn persist(&self, state: &TaskState) {
        save_persisted_state(&self.storage, TASKS_STORE_KEY, TASKS_SCHEMA_VERSION, state);
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
