//! Background pulse worker.
//!
//! A single long-lived tokio task plays the role of the isolated timing
//! context: it owns the delay loop and reports elapsed time by invoking a
//! callback handed to it over the command channel. UI-side jank cannot slow
//! it down, and the channel gives the ordering guarantee the state machine
//! relies on -- commands are processed before any further scheduled fire, so
//! a pause is never followed by a stray tick.
//!
//! The delay loop self-corrects: each fire measures how late it ran against
//! the ideal schedule and shortens the next delay by that much, keeping the
//! long-run rate at one pulse per period. A gap longer than a full period
//! means the host slept; the gap is folded into one pulse carrying the
//! missed whole seconds and the schedule baseline restarts.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::error::WorkerError;

/// Live tick handler marshalled into the worker task. Receives elapsed whole
/// seconds (1 on a nominal fire, more after host suspension).
pub type TickCallback = Box<dyn FnMut(u64) + Send>;

/// The three-operation surface the state machine drives the worker through.
/// Mockable seam: tests substitute a counting stub to pin down how many
/// pulse loops a sequence of calls creates.
pub trait PulseScheduler: Send + Sync {
    /// Begin pulsing. No-op when a loop is already active.
    fn start(&self, callback: TickCallback) -> Result<(), WorkerError>;
    /// Cancel the pending fire. No-op when idle.
    fn pause(&self);
    /// Cancel the pending fire and drop the drift baseline. No-op when idle.
    fn reset(&self);
}

enum Command {
    Start(TickCallback),
    Pause,
    Reset,
    Shutdown,
}

/// Bridge to the worker task. Lazily spawns the task on first use and
/// respawns it if it ever dies, so one broken timing source does not brick
/// the timer for the rest of the session.
pub struct TickWorker {
    period: Duration,
    tx: Mutex<Option<UnboundedSender<Command>>>,
}

impl TickWorker {
    pub fn new() -> Self {
        Self::with_period(Duration::from_millis(1000))
    }

    /// Worker with a non-standard pulse period (tests).
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            tx: Mutex::new(None),
        }
    }

    /// Tear the worker task down. The next `start` creates a fresh one.
    pub fn terminate(&self) {
        if let Some(tx) = self.lock().take() {
            let _ = tx.send(Command::Shutdown);
        }
    }

    fn spawn(period: Duration) -> Result<UnboundedSender<Command>, WorkerError> {
        let handle = Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_loop(rx, period));
        Ok(tx)
    }

    fn send_control(&self, command: Command) {
        let mut guard = self.lock();
        if let Some(tx) = guard.as_ref() {
            if tx.send(command).is_err() {
                // Task died; forget the channel so the next start respawns.
                *guard = None;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<UnboundedSender<Command>>> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TickWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseScheduler for TickWorker {
    fn start(&self, callback: TickCallback) -> Result<(), WorkerError> {
        let mut guard = self.lock();
        let mut command = Command::Start(callback);
        for attempt in 0..2 {
            let tx = match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => {
                    let tx = Self::spawn(self.period)?;
                    *guard = Some(tx.clone());
                    tx
                }
            };
            match tx.send(command) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    warn!(attempt, "pulse worker task is gone, respawning");
                    *guard = None;
                    command = returned;
                }
            }
        }
        Err(WorkerError::ChannelClosed)
    }

    fn pause(&self) {
        self.send_control(Command::Pause);
    }

    fn reset(&self) {
        self.send_control(Command::Reset);
    }
}

struct ActivePulse {
    callback: TickCallback,
    /// Ideal time of the next fire; advances by exactly one period per fire.
    expected: Instant,
    /// Wall-clock time of the previous fire, for folding suspension gaps.
    last_fire: Instant,
}

async fn run_loop(mut rx: UnboundedReceiver<Command>, period: Duration) {
    debug!("pulse worker task started");
    let mut active: Option<ActivePulse> = None;
    loop {
        let command = match active.as_mut() {
            None => rx.recv().await,
            Some(pulse) => {
                tokio::select! {
                    // Commands beat a due fire: a pause processed here can
                    // never be followed by a tick from the same loop.
                    biased;
                    cmd = rx.recv() => cmd,
                    () = sleep_until(pulse.expected) => {
                        fire(pulse, period);
                        continue;
                    }
                }
            }
        };
        match command {
            Some(Command::Start(callback)) => {
                if active.is_none() {
                    let now = Instant::now();
                    active = Some(ActivePulse {
                        callback,
                        expected: now + period,
                        last_fire: now,
                    });
                }
                // Already pulsing: idempotent, keep the existing loop.
            }
            Some(Command::Pause) | Some(Command::Reset) => {
                // The drift baseline lives in ActivePulse, so dropping the
                // loop clears it; pause and reset coincide here.
                active = None;
            }
            Some(Command::Shutdown) | None => break,
        }
    }
    debug!("pulse worker task stopped");
}

fn fire(pulse: &mut ActivePulse, period: Duration) {
    let now = Instant::now();
    // tokio Instants saturate: zero when we somehow ran early.
    let drift = now.duration_since(pulse.expected);
    let elapsed_secs = if drift > period {
        // Host slept through at least one full period. Fold the gap into a
        // single pulse and restart the baseline rather than replaying every
        // missed fire.
        let since_last = now.duration_since(pulse.last_fire);
        pulse.expected = now + period;
        whole_seconds(since_last).max(1)
    } else {
        // Nominal fire: the next ideal deadline is one period further along,
        // so the upcoming delay is `period - drift` and late fires do not
        // accumulate.
        pulse.expected += period;
        1
    };
    pulse.last_fire = now;
    (pulse.callback)(elapsed_secs);
}

fn whole_seconds(d: Duration) -> u64 {
    (d.as_millis() as u64 + 500) / 1000
}
