//! # PomoZen Core Library
//!
//! Core engine for the PomoZen focus timer: cyclical work/break intervals,
//! task tracking, daily statistics and settings, with versioned persistence.
//! The CLI binary is a thin layer over this crate; any other front end
//! composes the same pieces.
//!
//! ## Architecture
//!
//! - **Pulse worker**: a background task producing drift-corrected 1 Hz
//!   ticks, driven over a command channel so cancellation is never raced by
//!   a stray tick
//! - **Timer engine**: the authoritative state machine -- mode transitions
//!   on the 4:1 cadence, exactly-once completion side effects, auto-start
//! - **Storage**: a SQLite key-value store behind a never-failing front that
//!   degrades to memory, with versioned snapshot migration and full-state
//!   backup import/export
//! - **Event bus**: typed publish/subscribe decoupling the engine from
//!   sound, notification and display concerns
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: timer control surface and read accessors
//! - [`TickWorker`]: the background pulse scheduler
//! - [`SafeStorage`]: degradation-tolerant persistence front
//! - [`SettingsStore`] / [`TaskStore`]: the engine's collaborators
//! - [`EventBus`]: `timer:tick` / `timer:complete` subscriptions

pub mod error;
pub mod events;
pub mod settings;
pub mod storage;
pub mod task;
pub mod timer;

pub use error::{CoreError, ImportError, Result, StorageError, WorkerError};
pub use events::{EventBus, Subscription};
pub use settings::{Durations, SettingsState, SettingsStore, ZenTrack};
pub use storage::migrations::{TimeSnapshot, TIME_SCHEMA_VERSION};
pub use storage::{export_backup, import_backup, Backup, SafeStorage, StorageWarning, BACKUP_VERSION};
pub use task::{Task, TaskState, TaskStore};
pub use timer::{
    format_time, DailyStats, History, PulseScheduler, TickCallback, TickWorker, TimerEngine,
    TimerMode, POMODOROS_PER_SET,
};
