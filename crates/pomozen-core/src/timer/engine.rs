//! Timer engine: the authoritative Pomodoro state transitions.
//!
//! `TimerEngine` wraps the pure [`TimeState`] with locking, the pulse
//! scheduler, the event bus, the task collaborator and write-through
//! persistence. All mutation funnels through its methods; nothing else in
//! the crate touches timer state.
//!
//! Completion is exactly-once by construction: the tick handler is the sole
//! mutator of the countdown, it runs one tick to term under the state lock,
//! and the very first thing a completing tick does is stop the pulse loop.
//! Mode transitions are atomic -- the clamp to zero and the refill with the
//! next mode's duration happen inside one lock acquisition, so no reader
//! ever observes the transient zero.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::events::EventBus;
use crate::settings::SettingsStore;
use crate::storage::migrations::{load_time_snapshot, save_time_snapshot, TimeSnapshot};
use crate::storage::SafeStorage;
use crate::task::TaskStore;
use crate::timer::state::{today_key, TimeState};
use crate::timer::worker::{PulseScheduler, TickCallback};
use crate::timer::{History, TimerMode};

/// Cheap-to-clone handle to the one timer. Construct a single instance at
/// application start and pass clones to whatever needs timer access.
#[derive(Clone)]
pub struct TimerEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    state: Mutex<TimeState>,
    settings: Arc<SettingsStore>,
    tasks: Arc<TaskStore>,
    events: EventBus,
    scheduler: Arc<dyn PulseScheduler>,
    storage: Arc<SafeStorage>,
}

enum TickOutcome {
    Ticking,
    Completed { finished: TimerMode, auto_start: bool },
}

impl TimerEngine {
    /// Build the engine, rehydrating persisted timer state (with schema
    /// migration) from `storage`. The snapshot's `is_running` is ignored:
    /// a fresh process has no pulse loop, so the timer always wakes paused.
    pub fn new(
        settings: Arc<SettingsStore>,
        tasks: Arc<TaskStore>,
        events: EventBus,
        scheduler: Arc<dyn PulseScheduler>,
        storage: Arc<SafeStorage>,
    ) -> Self {
        let snapshot = load_time_snapshot(&storage);
        let state = TimeState::from_snapshot(snapshot, &settings.durations());
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                settings,
                tasks,
                events,
                scheduler,
                storage,
            }),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin counting down. No-op when already running, so a double-click
    /// can never create a second pulse loop. If the scheduler cannot start,
    /// the running flag is reverted before the error is returned -- the UI
    /// must never show a running timer with no clock underneath.
    pub fn start(&self) -> Result<(), CoreError> {
        {
            let mut state = self.inner.lock_state();
            if state.is_running {
                return Ok(());
            }
            state.is_running = true;
            self.inner.persist(&state);
        }

        let weak = Arc::downgrade(&self.inner);
        let callback: TickCallback = Box::new(move |elapsed| {
            if let Some(inner) = weak.upgrade() {
                TimerEngine { inner }.handle_tick(elapsed);
            }
        });

        match self.inner.scheduler.start(callback) {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut state = self.inner.lock_state();
                state.is_running = false;
                self.inner.persist(&state);
                warn!(error = %e, "timing source failed to start, reverting to paused");
                Err(e.into())
            }
        }
    }

    /// Stop counting down, keeping the remaining time.
    pub fn pause(&self) {
        {
            let mut state = self.inner.lock_state();
            state.is_running = false;
            self.inner.persist(&state);
        }
        self.inner.scheduler.pause();
    }

    /// Stop and restore the current mode's full duration (read from settings
    /// now, so a changed configuration takes effect here).
    pub fn reset(&self) {
        let durations = self.inner.settings.durations();
        {
            let mut state = self.inner.lock_state();
            state.is_running = false;
            state.time_left = durations.seconds(state.mode);
            self.inner.persist(&state);
        }
        self.inner.scheduler.reset();
    }

    /// Switch modes without recording anything: no history entry, no cycle
    /// credit.
    pub fn set_mode(&self, mode: TimerMode) {
        let durations = self.inner.settings.durations();
        {
            let mut state = self.inner.lock_state();
            state.switch_mode(mode, &durations);
            self.inner.persist(&state);
        }
        self.inner.scheduler.reset();
    }

    /// Switch modes, crediting an abandoned work interval toward cycle
    /// position (but never toward history -- nothing actually completed).
    pub fn switch_mode_with_skip(&self, mode: TimerMode) {
        let durations = self.inner.settings.durations();
        {
            let mut state = self.inner.lock_state();
            if state.credit_skip(mode) {
                debug!("crediting skipped work interval toward cycle position");
            }
            state.switch_mode(mode, &durations);
            self.inner.persist(&state);
        }
        self.inner.scheduler.reset();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn time_left(&self) -> u64 {
        self.inner.lock_state().time_left
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().is_running
    }

    pub fn mode(&self) -> TimerMode {
        self.inner.lock_state().mode
    }

    pub fn pomodoros_completed(&self) -> u32 {
        self.inner.lock_state().pomodoros_completed
    }

    pub fn history(&self) -> History {
        self.inner.lock_state().history.clone()
    }

    pub fn snapshot(&self) -> TimeSnapshot {
        self.inner.lock_state().snapshot()
    }

    /// The bus carrying `timer:tick` and `timer:complete`.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Replace the whole timer state (backup import). The caller has already
    /// validated the snapshot. Any active countdown is cancelled.
    pub fn replace_snapshot(&self, snapshot: TimeSnapshot) {
        let durations = self.inner.settings.durations();
        {
            let mut state = self.inner.lock_state();
            *state = TimeState::from_snapshot(snapshot, &durations);
            self.inner.persist(&state);
        }
        self.inner.scheduler.reset();
    }

    // ── Tick handling ────────────────────────────────────────────────

    /// Invoked by the pulse worker with elapsed whole seconds (more than 1
    /// when the scheduler folded a suspension gap into one pulse).
    fn handle_tick(&self, elapsed: u64) {
        let outcome = {
            let mut state = self.inner.lock_state();
            if !state.is_running {
                // A pulse that raced a pause; the countdown already stopped.
                return;
            }
            state.apply_elapsed(elapsed);
            if state.time_left > 0 {
                self.inner.persist(&state);
                TickOutcome::Ticking
            } else {
                // Completion. Halt the pulse loop before any side effect so
                // repeated pulses cannot re-run the completion path, then
                // record + advance atomically under the lock.
                state.is_running = false;
                self.inner.scheduler.pause();
                let finished = state.mode;
                let durations = self.inner.settings.durations();
                state.complete_interval(&today_key(), &durations);
                self.inner.persist(&state);
                TickOutcome::Completed {
                    finished,
                    auto_start: self.inner.settings.auto_start(),
                }
            }
        };

        // Listeners run outside the state lock so they can query the timer.
        self.inner.events.emit_tick(elapsed);
        if let TickOutcome::Completed { finished, auto_start } = outcome {
            self.inner.events.emit_complete(finished);
            if finished == TimerMode::Pomodoro {
                if let Some(id) = self.inner.tasks.active_task_id() {
                    self.inner.tasks.increment_completed_intervals(id);
                }
            }
            if auto_start {
                if let Err(e) = self.start() {
                    warn!(error = %e, "auto-start after completion failed");
                }
            }
        }
    }
}

impl EngineInner {
    fn persist(&self, state: &TimeState) {
        save_time_snapshot(&self.storage, &state.snapshot());
    }

    fn lock_state(&self) -> MutexGuard<'_, TimeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
