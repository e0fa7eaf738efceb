use std::io::Write;

use clap::Subcommand;
use pomozen_core::{format_time, TimerMode};
use tokio::sync::mpsc;

use crate::common::{open_app, App};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the countdown in the foreground (Ctrl-C pauses and exits)
    Start {
        /// Stop after this many completed intervals
        #[arg(long, default_value = "1")]
        intervals: u32,
    },
    /// Print current timer state as JSON
    Status,
    /// Restore the current mode's full duration
    Reset,
    /// Switch mode without recording anything (pomodoro, short, long)
    Mode { mode: String },
    /// Abandon the in-progress interval for another mode, keeping cycle
    /// position (a skipped work interval still counts toward the long break)
    Skip { mode: String },
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app();
    match action {
        TimerAction::Start { intervals } => run_foreground(&app, intervals).await?,
        TimerAction::Status => print_status(&app)?,
        TimerAction::Reset => {
            app.timer.reset();
            print_status(&app)?;
        }
        TimerAction::Mode { mode } => {
            let mode: TimerMode = mode.parse()?;
            app.timer.set_mode(mode);
            print_status(&app)?;
        }
        TimerAction::Skip { mode } => {
            let mode: TimerMode = mode.parse()?;
            app.timer.switch_mode_with_skip(mode);
            print_status(&app)?;
        }
    }
    Ok(())
}

fn print_status(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&app.timer.snapshot())?);
    Ok(())
}

async fn run_foreground(app: &App, intervals: u32) -> Result<(), Box<dyn std::error::Error>> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let complete_sub = app.timer.events().on_complete(move |mode| {
        let _ = done_tx.send(mode);
    });

    let display = app.timer.clone();
    let tick_sub = app.timer.events().on_tick(move |_| {
        let snap = display.snapshot();
        print!("\r{:<9} {}   ", snap.mode.to_string(), format_time(snap.time_left));
        let _ = std::io::stdout().flush();
    });

    app.timer.start()?;
    println!(
        "{} for {} -- Ctrl-C pauses and exits",
        app.timer.mode(),
        format_time(app.timer.time_left())
    );

    let mut completed = 0u32;
    loop {
        tokio::select! {
            maybe_mode = done_rx.recv() => {
                let Some(mode) = maybe_mode else { break };
                completed += 1;
                println!("\n{mode} interval complete ({completed}/{intervals})");
                if completed >= intervals {
                    break;
                }
                // Auto-start may already be counting the next interval down.
                if !app.timer.is_running() {
                    app.timer.start()?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                app.timer.pause();
                println!("\npaused at {}", format_time(app.timer.time_left()));
                break;
            }
        }
    }

    complete_sub.unsubscribe();
    tick_sub.unsubscribe();
    app.timer.pause();
    app.worker.terminate();
    Ok(())
}
