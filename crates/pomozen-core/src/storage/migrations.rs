//! Persisted-snapshot schema versioning.
//!
//! Every store persists as a JSON envelope `{ "version": N, "state": {...} }`
//! under its own key. The time snapshot is the only one with shipped legacy
//! versions: v0/v1 kept `history` as a flat per-day integer, v2 (current)
//! breaks each day down by mode. Migration is total -- every older version
//! upgrades deterministically, and structurally invalid data is discarded in
//! favor of defaults rather than surfaced as an error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage::SafeStorage;
use crate::timer::{DailyStats, History, TimerMode};

pub const TIME_STORE_KEY: &str = "pomo-time-storage";
pub const SETTINGS_STORE_KEY: &str = "pomo-settings-storage";
pub const TASKS_STORE_KEY: &str = "pomo-tasks-storage";

/// Current time snapshot schema version.
pub const TIME_SCHEMA_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    version: u32,
    state: serde_json::Value,
}

/// The serialized subset of timer state, current schema (v2).
///
/// Field names stay camelCase on disk so snapshots written by earlier
/// releases parse unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSnapshot {
    pub time_left: u64,
    pub is_running: bool,
    pub mode: TimerMode,
    pub pomodoros_completed: u32,
    pub history: History,
}

impl Default for TimeSnapshot {
    fn default() -> Self {
        Self {
            time_left: 25 * 60,
            is_running: false,
            mode: TimerMode::Pomodoro,
            pomodoros_completed: 0,
            history: History::new(),
        }
    }
}

/// v0/v1 on-disk shape: history was a flat `date -> completions` count.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapshotV1 {
    time_left: u64,
    is_running: bool,
    mode: TimerMode,
    pomodoros_completed: u32,
    history: BTreeMap<String, u32>,
}

impl Default for SnapshotV1 {
    fn default() -> Self {
        Self {
            time_left: 25 * 60,
            is_running: false,
            mode: TimerMode::Pomodoro,
            pomodoros_completed: 0,
            history: BTreeMap::new(),
        }
    }
}

/// v1 -> v2: the flat count predates break tracking, so every legacy
/// completion was a work interval.
fn upgrade_v1(old: SnapshotV1) -> TimeSnapshot {
    let history = old
        .history
        .into_iter()
        .map(|(date, count)| {
            (
                date,
                DailyStats {
                    pomodoro: count,
                    short: 0,
                    long: 0,
                },
            )
        })
        .collect();
    TimeSnapshot {
        time_left: old.time_left,
        is_running: old.is_running,
        mode: old.mode,
        pomodoros_completed: old.pomodoros_completed,
        history,
    }
}

/// Load the persisted time snapshot, migrating older schemas forward.
/// Anything unreadable yields the default snapshot.
pub fn load_time_snapshot(storage: &SafeStorage) -> TimeSnapshot {
    let Some(raw) = storage.get_item(TIME_STORE_KEY) else {
        return TimeSnapshot::default();
    };
    let envelope: Envelope = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "discarding unreadable time snapshot");
            return TimeSnapshot::default();
        }
    };
    match envelope.version {
        0 | 1 => match serde_json::from_value::<SnapshotV1>(envelope.state) {
            Ok(old) => {
                info!(from = envelope.version, to = TIME_SCHEMA_VERSION, "migrating time snapshot");
                upgrade_v1(old)
            }
            Err(e) => {
                warn!(error = %e, "discarding structurally invalid v0/v1 time snapshot");
                TimeSnapshot::default()
            }
        },
        TIME_SCHEMA_VERSION => serde_json::from_value(envelope.state).unwrap_or_else(|e| {
            warn!(error = %e, "discarding structurally invalid time snapshot");
            TimeSnapshot::default()
        }),
        newer => {
            warn!(version = newer, "time snapshot written by a newer build, starting fresh");
            TimeSnapshot::default()
        }
    }
}

pub fn save_time_snapshot(storage: &SafeStorage, snapshot: &TimeSnapshot) {
    save_persisted_state(storage, TIME_STORE_KEY, TIME_SCHEMA_VERSION, snapshot);
}

/// Load a non-versioned store's state (settings, tasks). Unreadable data
/// yields `None` so the caller can fall back to defaults.
pub(crate) fn load_persisted_state<T: DeserializeOwned>(
    storage: &SafeStorage,
    key: &str,
) -> Option<T> {
    let raw = storage.get_item(key)?;
    let envelope: Envelope = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(key, error = %e, "discarding unreadable persisted state");
            return None;
        }
    };
    match serde_json::from_value(envelope.state) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(key, error = %e, "discarding structurally invalid persisted state");
            None
        }
    }
}

pub(crate) fn save_persisted_state<T: Serialize>(
    storage: &SafeStorage,
    key: &str,
    version: u32,
    state: &T,
) {
    let envelope = Envelope {
        version,
        state: match serde_json::to_value(state) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "cannot serialize state, skipping persist");
                return;
            }
        },
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => storage.set_item(key, &json),
        Err(e) => warn!(key, error = %e, "cannot serialize envelope, skipping persist"),
    }
}
