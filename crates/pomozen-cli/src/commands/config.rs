use clap::Subcommand;
use pomozen_core::{TimerMode, ZenTrack};

use crate::common::open_app;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the full configuration as JSON
    Show,
    /// Print a single value by dot-separated key
    Get { key: String },
    /// Set a value by dot-separated key
    Set { key: String, value: String },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app();
    let settings = &app.settings;
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings.snapshot())?);
        }
        ConfigAction::Get { key } => {
            let value = match key.as_str() {
                "durations.pomodoro" => settings.durations().pomodoro.to_string(),
                "durations.short" => settings.durations().short.to_string(),
                "durations.long" => settings.durations().long.to_string(),
                "autoStart" => settings.auto_start().to_string(),
                "soundEnabled" => settings.sound_enabled().to_string(),
                "zenModeEnabled" => settings.zen_mode_enabled().to_string(),
                "zenTrack" => settings.zen_track().to_string(),
                "zenVolume" => settings.zen_volume().to_string(),
                other => return Err(format!("unknown config key: {other}").into()),
            };
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            match key.as_str() {
                "durations.pomodoro" | "durations.short" | "durations.long" => {
                    let minutes: u32 = value.parse()?;
                    // The store accepts anything; the bound lives here at
                    // the user-facing edge.
                    if !(1..=60).contains(&minutes) {
                        return Err("duration must be between 1 and 60 minutes".into());
                    }
                    let mode = match key.as_str() {
                        "durations.pomodoro" => TimerMode::Pomodoro,
                        "durations.short" => TimerMode::Short,
                        _ => TimerMode::Long,
                    };
                    settings.update_duration(mode, minutes);
                }
                "autoStart" => settings.set_auto_start(value.parse()?),
                "soundEnabled" => settings.set_sound_enabled(value.parse()?),
                "zenModeEnabled" => settings.set_zen_mode_enabled(value.parse()?),
                "zenTrack" => settings.set_zen_track(value.parse::<ZenTrack>()?),
                "zenVolume" => {
                    let volume: f64 = value.parse()?;
                    if !(0.0..=1.0).contains(&volume) {
                        return Err("volume must be between 0 and 1".into());
                    }
                    settings.set_zen_volume(volume);
                }
                other => return Err(format!("unknown config key: {other}").into()),
            }
            println!("{}", serde_json::to_string_pretty(&settings.snapshot())?);
        }
    }
    Ok(())
}
