//! Full-state backup: one JSON document holding every persisted store.
//!
//! Import is all-or-nothing. The document is parsed and every field is
//! validated (types via serde, ranges and referential shape here) before the
//! first store mutation; a rejected document leaves all stores exactly as
//! they were.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ImportError;
use crate::settings::{SettingsState, SettingsStore};
use crate::storage::migrations::TimeSnapshot;
use crate::task::{TaskState, TaskStore};
use crate::timer::TimerEngine;

pub const BACKUP_VERSION: u32 = 1;

/// Ceiling for an imported countdown: the longest configurable interval.
const MAX_TIME_LEFT_SECS: u64 = 60 * 60;
const MAX_TITLE_LEN: usize = 100;
const DURATION_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

/// The exported document. Key names match the original backup format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub time_store: TimeSnapshot,
    pub task_store: TaskState,
    pub settings_store: SettingsState,
    /// Export time, epoch milliseconds.
    pub timestamp: i64,
    pub version: u32,
}

/// Capture every persisted store into one document.
pub fn export_backup(timer: &TimerEngine, tasks: &TaskStore, settings: &SettingsStore) -> Backup {
    Backup {
        time_store: timer.snapshot(),
        task_store: tasks.snapshot(),
        settings_store: settings.snapshot(),
        timestamp: Utc::now().timestamp_millis(),
        version: BACKUP_VERSION,
    }
}

/// Validate `json` fully, then apply it to all three stores. Settings land
/// first so the restored time snapshot is clamped against the restored
/// durations.
pub fn import_backup(
    json: &str,
    timer: &TimerEngine,
    tasks: &TaskStore,
    settings: &SettingsStore,
) -> Result<(), ImportError> {
    let backup: Backup = serde_json::from_str(json).map_err(|e| {
        warn!(error = %e, "rejecting malformed backup document");
        ImportError::Malformed(e)
    })?;
    validate(&backup)?;

    settings.replace(backup.settings_store);
    tasks.replace(backup.task_store);
    timer.replace_snapshot(backup.time_store);
    Ok(())
}

fn validate(backup: &Backup) -> Result<(), ImportError> {
    if backup.version != BACKUP_VERSION {
        return Err(ImportError::UnsupportedVersion(backup.version));
    }
    if backup.timestamp < 0 {
        return Err(invalid("timestamp", "must not be negative"));
    }

    let durations = &backup.settings_store.durations;
    for (field, minutes) in [
        ("settingsStore.durations.pomodoro", durations.pomodoro),
        ("settingsStore.durations.short", durations.short),
        ("settingsStore.durations.long", durations.long),
    ] {
        if !DURATION_RANGE.contains(&minutes) {
            return Err(invalid(field, "must be between 1 and 60 minutes"));
        }
    }
    let volume = backup.settings_store.zen_volume;
    if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
        return Err(invalid("settingsStore.zenVolume", "must be between 0 and 1"));
    }

    if backup.time_store.time_left > MAX_TIME_LEFT_SECS {
        return Err(invalid("timeStore.timeLeft", "exceeds the longest possible interval"));
    }
    for date in backup.time_store.history.keys() {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(invalid("timeStore.history", "keys must be YYYY-MM-DD dates"));
        }
    }

    for task in &backup.task_store.tasks {
        if task.title.chars().count() > MAX_TITLE_LEN {
            return Err(invalid("taskStore.tasks.title", "longer than 100 characters"));
        }
    }
    if let Some(active) = backup.task_store.active_task_id {
        if !backup.task_store.tasks.iter().any(|t| t.id == active) {
            return Err(invalid("taskStore.activeTaskId", "refers to no task in the document"));
        }
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ImportError {
    ImportError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::storage::SafeStorage;
    use crate::timer::{PulseScheduler, TickCallback, TimerMode};
    use std::sync::Arc;

    struct NullScheduler;
    impl PulseScheduler for NullScheduler {
        fn start(&self, _callback: TickCallback) -> Result<(), crate::error::WorkerError> {
            Ok(())
        }
        fn pause(&self) {}
        fn reset(&self) {}
    }

    struct Stores {
        timer: TimerEngine,
        tasks: Arc<TaskStore>,
        settings: Arc<SettingsStore>,
        storage: Arc<SafeStorage>,
    }

    fn stores() -> Stores {
        let storage = Arc::new(SafeStorage::in_memory());
        let settings = Arc::new(SettingsStore::load(Arc::clone(&storage)));
        let tasks = Arc::new(TaskStore::load(Arc::clone(&storage)));
        let timer = TimerEngine::new(
            Arc::clone(&settings),
            Arc::clone(&tasks),
            EventBus::new(),
            Arc::new(NullScheduler),
            Arc::clone(&storage),
        );
        Stores {
            timer,
            tasks,
            settings,
            storage,
        }
    }

    #[test]
    fn export_clear_import_roundtrips_every_persisted_field() {
        let s = stores();
        s.settings.update_duration(TimerMode::Short, 10);
        s.settings.set_auto_start(true);
        let task = s.tasks.add_task("write tests", 3);
        s.tasks.set_active_task(Some(task));
        s.tasks.increment_completed_intervals(task);
        s.timer.switch_mode_with_skip(TimerMode::Short);

        let exported = export_backup(&s.timer, &s.tasks, &s.settings);
        let json = serde_json::to_string(&exported).unwrap();

        // Wipe everything, then restore into a fresh set of stores.
        s.storage.clear();
        let fresh = stores();
        import_backup(&json, &fresh.timer, &fresh.tasks, &fresh.settings).unwrap();

        assert_eq!(fresh.timer.snapshot(), exported.time_store);
        assert_eq!(fresh.tasks.snapshot(), exported.task_store);
        assert_eq!(fresh.settings.snapshot(), exported.settings_store);
    }

    #[test]
    fn document_uses_the_original_key_names() {
        let s = stores();
        let json = serde_json::to_string(&export_backup(&s.timer, &s.tasks, &s.settings)).unwrap();
        for key in ["timeStore", "taskStore", "settingsStore", "timestamp", "version"] {
            assert!(json.contains(&format!("\"{key}\"")), "missing {key}");
        }
        assert!(json.contains("\"pomodorosCompleted\""));
        assert!(json.contains("\"autoStart\""));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let s = stores();
        let mut backup = export_backup(&s.timer, &s.tasks, &s.settings);
        backup.version = 7;
        let json = serde_json::to_string(&backup).unwrap();
        let err = import_backup(&json, &s.timer, &s.tasks, &s.settings).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedVersion(7)));
    }

    #[test]
    fn rejected_import_mutates_nothing() {
        let s = stores();
        s.settings.update_duration(TimerMode::Pomodoro, 30);
        let before_settings = s.settings.snapshot();
        let before_time = s.timer.snapshot();

        let mut backup = export_backup(&s.timer, &s.tasks, &s.settings);
        backup.settings_store.durations.long = 0; // out of range
        backup.task_store.tasks.push(crate::task::Task {
            id: uuid::Uuid::new_v4(),
            title: "would otherwise land".into(),
            completed: false,
            est_pomodoros: 1,
            act_pomodoros: 0,
        });
        let json = serde_json::to_string(&backup).unwrap();

        let err = import_backup(&json, &s.timer, &s.tasks, &s.settings).unwrap_err();
        assert!(matches!(err, ImportError::InvalidValue { .. }));
        assert_eq!(s.settings.snapshot(), before_settings);
        assert_eq!(s.timer.snapshot(), before_time);
        assert!(s.tasks.tasks().is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let s = stores();
        assert!(matches!(
            import_backup("{\"timeStore\":", &s.timer, &s.tasks, &s.settings),
            Err(ImportError::Malformed(_))
        ));
        // Wrong field type: timeLeft as a string.
        let bad = r#"{"timeStore":{"timeLeft":"soon"},"taskStore":{},"settingsStore":{},"timestamp":0,"version":1}"#;
        assert!(matches!(
            import_backup(bad, &s.timer, &s.tasks, &s.settings),
            Err(ImportError::Malformed(_))
        ));
    }

    #[test]
    fn dangling_active_task_is_rejected() {
        let s = stores();
        let mut backup = export_backup(&s.timer, &s.tasks, &s.settings);
        backup.task_store.active_task_id = Some(uuid::Uuid::new_v4());
        let json = serde_json::to_string(&backup).unwrap();
        assert!(matches!(
            import_backup(&json, &s.timer, &s.tasks, &s.settings),
            Err(ImportError::InvalidValue { .. })
        ));
    }

    #[test]
    fn bad_history_date_key_is_rejected() {
        let s = stores();
        let mut backup = export_backup(&s.timer, &s.tasks, &s.settings);
        backup
            .time_store
            .history
            .insert("someday".into(), Default::default());
        let json = serde_json::to_string(&backup).unwrap();
        assert!(matches!(
            import_backup(&json, &s.timer, &s.tasks, &s.settings),
            Err(ImportError::InvalidValue { .. })
        ));
    }
}
