//! User preferences: interval durations, auto-start policy, sound and
//! ambient-audio ("zen") selections.
//!
//! The state machine reads durations through [`SettingsStore`] at the moment
//! a duration is needed -- nothing is cached, so an updated duration takes
//! effect on the next reset or mode change, never mid-interval. Duration
//! bounds (1-60 minutes) are enforced at the UI edge, not here.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::storage::migrations::{load_persisted_state, save_persisted_state, SETTINGS_STORE_KEY};
use crate::storage::SafeStorage;
use crate::timer::TimerMode;

/// Configured interval lengths in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub pomodoro: u32,
    pub short: u32,
    pub long: u32,
}

impl Durations {
    pub fn minutes(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Pomodoro => self.pomodoro,
            TimerMode::Short => self.short,
            TimerMode::Long => self.long,
        }
    }

    /// Interval length in whole seconds (the unit the timer counts in).
    pub fn seconds(&self, mode: TimerMode) -> u64 {
        u64::from(self.minutes(mode)) * 60
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            pomodoro: 25,
            short: 5,
            long: 15,
        }
    }
}

/// Ambient audio track selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZenTrack {
    Rain,
    WhiteNoise,
    Forest,
}

impl ZenTrack {
    pub fn as_str(self) -> &'static str {
        match self {
            ZenTrack::Rain => "rain",
            ZenTrack::WhiteNoise => "white_noise",
            ZenTrack::Forest => "forest",
        }
    }
}

impl fmt::Display for ZenTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZenTrack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rain" => Ok(ZenTrack::Rain),
            "white_noise" => Ok(ZenTrack::WhiteNoise),
            "forest" => Ok(ZenTrack::Forest),
            other => Err(format!(
                "unknown zen track '{other}' (expected rain, white_noise or forest)"
            )),
        }
    }
}

/// The persisted settings shape. Field names stay camelCase on disk so
/// snapshots written by earlier releases parse unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsState {
    pub durations: Durations,
    pub auto_start: bool,
    pub sound_enabled: bool,
    pub zen_mode_enabled: bool,
    pub zen_track: ZenTrack,
    pub zen_volume: f64,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            durations: Durations::default(),
            auto_start: false,
            sound_enabled: true,
            zen_mode_enabled: false,
            zen_track: ZenTrack::Rain,
            zen_volume: 0.5,
        }
    }
}

const SETTINGS_SCHEMA_VERSION: u32 = 0;

/// Write-through settings store.
pub struct SettingsStore {
    storage: Arc<SafeStorage>,
    state: Mutex<SettingsState>,
}

impl SettingsStore {
    /// Rehydrate from storage, falling back to defaults when nothing (or
    /// something unreadable) is persisted.
    pub fn load(storage: Arc<SafeStorage>) -> Self {
        let state = load_persisted_state::<SettingsState>(&storage, SETTINGS_STORE_KEY)
            .unwrap_or_default();
        Self {
            storage,
            state: Mutex::new(state),
        }
    }

    pub fn durations(&self) -> Durations {
        self.lock().durations
    }

    pub fn auto_start(&self) -> bool {
        self.lock().auto_start
    }

    pub fn sound_enabled(&self) -> bool {
        self.lock().sound_enabled
    }

    pub fn zen_mode_enabled(&self) -> bool {
        self.lock().zen_mode_enabled
    }

    pub fn zen_track(&self) -> ZenTrack {
        self.lock().zen_track
    }

    pub fn zen_volume(&self) -> f64 {
        self.lock().zen_volume
    }

    pub fn update_duration(&self, mode: TimerMode, minutes: u32) {
        let mut state = self.lock();
        match mode {
            TimerMode::Pomodoro => state.durations.pomodoro = minutes,
            TimerMode::Short => state.durations.short = minutes,
            TimerMode::Long => state.durations.long = minutes,
        }
        self.persist(&state);
    }

    pub fn set_auto_start(&self, enabled: bool) {
        let mut state = self.lock();
        state.auto_start = enabled;
        self.persist(&state);
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.sound_enabled = enabled;
        self.persist(&state);
    }

    pub fn set_zen_mode_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.zen_mode_enabled = enabled;
        self.persist(&state);
    }

    pub fn set_zen_track(&self, track: ZenTrack) {
        let mut state = self.lock();
        state.zen_track = track;
        self.persist(&state);
    }

    pub fn set_zen_volume(&self, volume: f64) {
        let mut state = self.lock();
        state.zen_volume = volume.clamp(0.0, 1.0);
        self.persist(&state);
    }

    pub fn snapshot(&self) -> SettingsState {
        self.lock().clone()
    }

    /// Replace the whole state (backup import). The caller has already
    /// validated the document.
    pub fn replace(&self, new_state: SettingsState) {
        let mut state = self.lock();
        *state = new_state;
        self.persist(&state);
    }

    fn persist(&self, state: &SettingsState) {
        save_persisted_state(&self.storage, SETTINGS_STORE_KEY, SETTINGS_SCHEMA_VERSION, state);
    }

    fn lock(&self) -> MutexGuard<'_, SettingsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_store() -> SettingsStore {
        SettingsStore::load(Arc::new(SafeStorage::in_memory()))
    }

    #[test]
    fn defaults_match_classic_pomodoro() {
        let settings = fresh_store();
        let d = settings.durations();
        assert_eq!((d.pomodoro, d.short, d.long), (25, 5, 15));
        assert!(!settings.auto_start());
        assert!(settings.sound_enabled());
        assert_eq!(settings.zen_track(), ZenTrack::Rain);
    }

    #[test]
    fn updates_survive_reload_through_same_storage() {
        let storage = Arc::new(SafeStorage::in_memory());
        let settings = SettingsStore::load(Arc::clone(&storage));
        settings.update_duration(TimerMode::Pomodoro, 50);
        settings.set_auto_start(true);
        settings.set_zen_track(ZenTrack::Forest);

        let reloaded = SettingsStore::load(storage);
        assert_eq!(reloaded.durations().pomodoro, 50);
        assert!(reloaded.auto_start());
        assert_eq!(reloaded.zen_track(), ZenTrack::Forest);
    }

    #[test]
    fn zen_volume_is_clamped() {
        let settings = fresh_store();
        settings.set_zen_volume(1.5);
        assert_eq!(settings.zen_volume(), 1.0);
        settings.set_zen_volume(-0.1);
        assert_eq!(settings.zen_volume(), 0.0);
    }

    #[test]
    fn corrupt_persisted_settings_fall_back_to_defaults() {
        let storage = Arc::new(SafeStorage::in_memory());
        storage.set_item(SETTINGS_STORE_KEY, "{not json");
        let settings = SettingsStore::load(storage);
        assert_eq!(settings.durations(), Durations::default());
    }

    #[test]
    fn durations_convert_to_seconds() {
        let d = Durations::default();
        assert_eq!(d.seconds(TimerMode::Pomodoro), 1500);
        assert_eq!(d.seconds(TimerMode::Short), 300);
        assert_eq!(d.seconds(TimerMode::Long), 900);
    }
}
