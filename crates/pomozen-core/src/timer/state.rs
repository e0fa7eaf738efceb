//! Pure Pomodoro state transitions.
//!
//! `TimeState` carries the data; every method is a synchronous, side-effect
//! free transition. The engine facade owns locking, scheduling, events and
//! persistence around these.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::settings::Durations;
use crate::storage::migrations::TimeSnapshot;
use crate::timer::TimerMode;

/// A long break follows every 4th completed work interval.
pub const POMODOROS_PER_SET: u32 = 4;

/// Per-day completion counts, one bucket per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub pomodoro: u32,
    pub short: u32,
    pub long: u32,
}

impl DailyStats {
    fn bump(&mut self, mode: TimerMode) {
        match mode {
            TimerMode::Pomodoro => self.pomodoro += 1,
            TimerMode::Short => self.short += 1,
            TimerMode::Long => self.long += 1,
        }
    }
}

/// Completion history keyed by local calendar date (`YYYY-MM-DD`).
/// Append-only per day; entries appear lazily on the first completion.
pub type History = BTreeMap<String, DailyStats>;

#[derive(Debug, Clone)]
pub(crate) struct TimeState {
    pub time_left: u64,
    pub is_running: bool,
    pub mode: TimerMode,
    pub pomodoros_completed: u32,
    pub history: History,
}

impl TimeState {
    pub fn new(durations: &Durations) -> Self {
        Self {
            time_left: durations.seconds(TimerMode::Pomodoro),
            is_running: false,
            mode: TimerMode::Pomodoro,
            pomodoros_completed: 0,
            history: History::new(),
        }
    }

    /// Rehydrate from a persisted snapshot. `is_running` is forced off (it is
    /// true iff a pulse loop exists, and a fresh process has none) and
    /// `time_left` is clamped to the current mode's configured duration in
    /// case settings changed between runs.
    pub fn from_snapshot(snapshot: TimeSnapshot, durations: &Durations) -> Self {
        let cap = durations.seconds(snapshot.mode);
        Self {
            time_left: snapshot.time_left.min(cap),
            is_running: false,
            mode: snapshot.mode,
            pomodoros_completed: snapshot.pomodoros_completed,
            history: snapshot.history,
        }
    }

    pub fn snapshot(&self) -> TimeSnapshot {
        TimeSnapshot {
            time_left: self.time_left,
            is_running: self.is_running,
            mode: self.mode,
            pomodoros_completed: self.pomodoros_completed,
            history: self.history.clone(),
        }
    }

    /// Count down by `elapsed` seconds, clamping at zero.
    pub fn apply_elapsed(&mut self, elapsed: u64) {
        self.time_left = self.time_left.saturating_sub(elapsed);
    }

    /// Record the just-finished interval and advance to the next mode:
    /// a completed work interval is followed by a long break when the
    /// completed count hits a multiple of [`POMODOROS_PER_SET`], otherwise a
    /// short one; a completed break always returns to work. Returns the new
    /// mode. `today` is the local calendar-date history key.
    pub fn complete_interval(&mut self, today: &str, durations: &Durations) -> TimerMode {
        let finished = self.mode;
        self.history.entry(today.to_string()).or_default().bump(finished);

        let next = if finished == TimerMode::Pomodoro {
            self.pomodoros_completed += 1;
            if self.pomodoros_completed % POMODOROS_PER_SET == 0 {
                TimerMode::Long
            } else {
                TimerMode::Short
            }
        } else {
            TimerMode::Pomodoro
        };

        self.mode = next;
        self.time_left = durations.seconds(next);
        next
    }

    /// Non-committal mode switch: no history, no counter movement.
    pub fn switch_mode(&mut self, mode: TimerMode, durations: &Durations) {
        self.mode = mode;
        self.is_running = false;
        self.time_left = durations.seconds(mode);
    }

    /// The skip-credit rule: abandoning a work interval for a break still
    /// counts toward cycle position (so the 4:1 cadence is preserved) but
    /// records nothing in history. Returns whether a credit was applied.
    pub fn credit_skip(&mut self, target: TimerMode) -> bool {
        let credited = self.mode == TimerMode::Pomodoro && target != TimerMode::Pomodoro;
        if credited {
            self.pomodoros_completed += 1;
        }
        credited
    }
}

/// Local calendar date key for history entries.
pub(crate) fn today_key() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn durations() -> Durations {
        Durations::default()
    }

    #[test]
    fn four_to_one_cadence() {
        let d = durations();
        let mut state = TimeState::new(&d);
        let mut next_modes = Vec::new();
        for _ in 0..4 {
            // Complete a work interval, then complete the break it chose.
            assert_eq!(state.mode, TimerMode::Pomodoro);
            state.apply_elapsed(state.time_left);
            let next = state.complete_interval("2024-03-01", &d);
            next_modes.push(next);
            state.apply_elapsed(state.time_left);
            state.complete_interval("2024-03-01", &d);
        }
        assert_eq!(
            next_modes,
            vec![TimerMode::Short, TimerMode::Short, TimerMode::Short, TimerMode::Long]
        );

        // The 8th completed pomodoro earns a long break again.
        for _ in 0..4 {
            state.apply_elapsed(state.time_left);
            next_modes.push(state.complete_interval("2024-03-01", &d));
            state.apply_elapsed(state.time_left);
            state.complete_interval("2024-03-01", &d);
        }
        assert_eq!(next_modes[7], TimerMode::Long);
        assert_eq!(state.pomodoros_completed, 8);
    }

    #[test]
    fn break_completion_returns_to_work() {
        let d = durations();
        let mut state = TimeState::new(&d);
        state.switch_mode(TimerMode::Long, &d);
        assert_eq!(state.complete_interval("2024-03-01", &d), TimerMode::Pomodoro);
        assert_eq!(state.time_left, d.seconds(TimerMode::Pomodoro));
        assert_eq!(state.pomodoros_completed, 0, "breaks never move the counter");
    }

    #[test]
    fn completion_refills_from_the_next_modes_duration() {
        let d = durations();
        let mut state = TimeState::new(&d);
        state.apply_elapsed(state.time_left);
        state.complete_interval("2024-03-01", &d);
        assert_eq!(state.mode, TimerMode::Short);
        assert_eq!(state.time_left, 300);
    }

    #[test]
    fn history_tracks_per_mode_per_day() {
        let d = durations();
        let mut state = TimeState::new(&d);
        state.complete_interval("2024-03-01", &d); // pomodoro
        state.complete_interval("2024-03-01", &d); // short
        state.complete_interval("2024-03-02", &d); // pomodoro
        let day1 = state.history["2024-03-01"];
        assert_eq!((day1.pomodoro, day1.short, day1.long), (1, 1, 0));
        let day2 = state.history["2024-03-02"];
        assert_eq!((day2.pomodoro, day2.short, day2.long), (1, 0, 0));
    }

    #[test]
    fn skip_credit_only_when_leaving_work_for_a_break() {
        let d = durations();
        let mut state = TimeState::new(&d);

        assert!(state.credit_skip(TimerMode::Short));
        assert_eq!(state.pomodoros_completed, 1);
        assert!(state.history.is_empty(), "skips never reach history");

        // Work -> work is not a skip.
        assert!(!state.credit_skip(TimerMode::Pomodoro));

        // Break -> anything is not a skip.
        state.switch_mode(TimerMode::Short, &d);
        assert!(!state.credit_skip(TimerMode::Pomodoro));
        assert!(!state.credit_skip(TimerMode::Long));
        assert_eq!(state.pomodoros_completed, 1);
    }

    #[test]
    fn switch_mode_resets_time_and_running() {
        let d = durations();
        let mut state = TimeState::new(&d);
        state.is_running = true;
        state.apply_elapsed(100);
        state.switch_mode(TimerMode::Long, &d);
        assert!(!state.is_running);
        assert_eq!(state.time_left, 900);
        assert_eq!(state.mode, TimerMode::Long);
    }

    #[test]
    fn hydration_clamps_and_stops() {
        let d = durations();
        let snap = TimeSnapshot {
            time_left: 9999,
            is_running: true,
            mode: TimerMode::Short,
            pomodoros_completed: 2,
            history: History::new(),
        };
        let state = TimeState::from_snapshot(snap, &d);
        assert_eq!(state.time_left, 300);
        assert!(!state.is_running);
        assert_eq!(state.pomodoros_completed, 2);
    }

    proptest! {
        #[test]
        fn elapsed_never_underflows(start in 0u64..4000, elapsed in 0u64..10_000) {
            let d = durations();
            let mut state = TimeState::new(&d);
            state.time_left = start;
            state.apply_elapsed(elapsed);
            prop_assert!(state.time_left <= start);
        }

        #[test]
        fn completion_always_lands_within_the_new_modes_duration(
            completions in 1usize..40,
        ) {
            let d = durations();
            let mut state = TimeState::new(&d);
            for _ in 0..completions {
                state.apply_elapsed(state.time_left);
                let next = state.complete_interval("2024-03-01", &d);
                prop_assert_eq!(state.time_left, d.seconds(next));
                prop_assert_eq!(state.mode, next);
            }
            let total: u32 = {
                let day = state.history["2024-03-01"];
                day.pomodoro + day.short + day.long
            };
            prop_assert_eq!(total as usize, completions);
        }
    }
}
