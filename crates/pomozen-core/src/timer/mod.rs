mod engine;
mod state;
mod worker;

pub use engine::TimerEngine;
pub use state::{DailyStats, History, POMODOROS_PER_SET};
pub use worker::{PulseScheduler, TickCallback, TickWorker};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three interval kinds of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Pomodoro,
    Short,
    Long,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Pomodoro => "pomodoro",
            TimerMode::Short => "short",
            TimerMode::Long => "long",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pomodoro" => Ok(TimerMode::Pomodoro),
            "short" => Ok(TimerMode::Short),
            "long" => Ok(TimerMode::Long),
            other => Err(format!("unknown timer mode '{other}' (expected pomodoro, short or long)")),
        }
    }
}

/// Format seconds as "MM:SS". Minutes run past 59 rather than rolling into
/// hours, matching the countdown display.
pub fn format_time(total_secs: u64) -> String {
    let m = total_secs / 60;
    let s = total_secs % 60;
    format!("{m:02}:{s:02}")
}
