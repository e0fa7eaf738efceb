//! Typed publish/subscribe bus for timer events.
//!
//! Two events exist: a completion notification carrying the mode that just
//! finished, and a tick notification carrying elapsed whole seconds. Both are
//! emitted synchronously, in registration order. Emitting with no subscribers
//! is a no-op.
//!
//! Listeners may unsubscribe (even from inside their own callback) via the
//! [`Subscription`] returned at registration; dropping a `Subscription`
//! without calling [`Subscription::unsubscribe`] leaves the listener attached.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use crate::timer::TimerMode;

type CompleteFn = Box<dyn FnMut(TimerMode) + Send>;
type TickFn = Box<dyn FnMut(u64) + Send>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Complete,
    Tick,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    complete: Vec<(u64, CompleteFn)>,
    tick: Vec<(u64, TickFn)>,
    /// Ids unsubscribed while their listener list was checked out by `emit`,
    /// tracked per event so a nested emit of the other kind cannot swallow
    /// them.
    removed_complete: HashSet<u64>,
    removed_tick: HashSet<u64>,
}

/// Application-wide event bus. Cheap to clone; all clones share one registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

/// Handle returned by `on_*`; removes exactly one listener.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
    kind: EventKind,
}

impl Subscription {
    /// Remove the listener this subscription refers to. Other listeners on
    /// the same event are unaffected. Safe to call after the bus is gone.
    pub fn unsubscribe(self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut reg = lock(&registry);
        let present = match self.kind {
            EventKind::Complete => {
                let before = reg.complete.len();
                reg.complete.retain(|(id, _)| *id != self.id);
                reg.complete.len() != before
            }
            EventKind::Tick => {
                let before = reg.tick.len();
                reg.tick.retain(|(id, _)| *id != self.id);
                reg.tick.len() != before
            }
        };
        if !present {
            // The listener list is currently checked out by an emit on
            // another frame of this thread; tombstone it instead.
            match self.kind {
                EventKind::Complete => reg.removed_complete.insert(self.id),
                EventKind::Tick => reg.removed_tick.insert(self.id),
            };
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to interval completions. The callback receives the mode
    /// that just finished.
    pub fn on_complete(&self, f: impl FnMut(TimerMode) + Send + 'static) -> Subscription {
        let mut reg = lock(&self.inner);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.complete.push((id, Box::new(f)));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            id,
            kind: EventKind::Complete,
        }
    }

    /// Subscribe to ticks. The callback receives elapsed whole seconds
    /// (usually 1, more after the host slept through pulses).
    pub fn on_tick(&self, f: impl FnMut(u64) + Send + 'static) -> Subscription {
        let mut reg = lock(&self.inner);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.tick.push((id, Box::new(f)));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            id,
            kind: EventKind::Tick,
        }
    }

    pub fn emit_complete(&self, mode: TimerMode) {
        // Check the listener list out of the registry so callbacks can
        // subscribe/unsubscribe without deadlocking on the bus lock.
        let mut listeners = {
            let mut reg = lock(&self.inner);
            std::mem::take(&mut reg.complete)
        };
        for (_, f) in listeners.iter_mut() {
            f(mode);
        }
        self.check_in(EventKind::Complete, listeners, Vec::new());
    }

    pub fn emit_tick(&self, elapsed_secs: u64) {
        let mut listeners = {
            let mut reg = lock(&self.inner);
            std::mem::take(&mut reg.tick)
        };
        for (_, f) in listeners.iter_mut() {
            f(elapsed_secs);
        }
        self.check_in(EventKind::Tick, Vec::new(), listeners);
    }

    /// Return a checked-out listener list, preserving registration order for
    /// listeners added during the emit and dropping tombstoned ones.
    fn check_in(&self, kind: EventKind, complete: Vec<(u64, CompleteFn)>, tick: Vec<(u64, TickFn)>) {
        let mut reg = lock(&self.inner);
        match kind {
            EventKind::Complete => {
                let removed = std::mem::take(&mut reg.removed_complete);
                let added = std::mem::take(&mut reg.complete);
                reg.complete = complete;
                reg.complete.extend(added);
                reg.complete.retain(|(id, _)| !removed.contains(id));
            }
            EventKind::Tick => {
                let removed = std::mem::take(&mut reg.removed_tick);
                let added = std::mem::take(&mut reg.tick);
                reg.tick = tick;
                reg.tick.extend(added);
                reg.tick.retain(|(id, _)| !removed.contains(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn emit_with_no_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit_complete(TimerMode::Pomodoro);
        bus.emit_tick(1);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let _s1 = bus.on_complete(move |_| a.lock().unwrap().push("first"));
        let _s2 = bus.on_complete(move |_| b.lock().unwrap().push("second"));
        bus.emit_complete(TimerMode::Short);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));
        let (a, b) = (Arc::clone(&hits), Arc::clone(&hits));
        let sub = bus.on_tick(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let _keep = bus.on_tick(move |n| {
            b.fetch_add(n as u32 * 10, Ordering::SeqCst);
        });
        sub.unsubscribe();
        bus.emit_tick(1);
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn unsubscribe_from_inside_listener_does_not_deadlock() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (hits2, slot2) = (Arc::clone(&hits), Arc::clone(&slot));
        let sub = bus.on_complete(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
            if let Some(s) = slot2.lock().unwrap().take() {
                s.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);
        bus.emit_complete(TimerMode::Long);
        bus.emit_complete(TimerMode::Long);
        assert_eq!(hits.load(Ordering::SeqCst), 1, "one-shot listener fired twice");
    }

    #[test]
    fn complete_carries_the_finished_mode() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let _sub = bus.on_complete(move |mode| seen2.lock().unwrap().push(mode));
        bus.emit_complete(TimerMode::Pomodoro);
        bus.emit_complete(TimerMode::Long);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TimerMode::Pomodoro, TimerMode::Long]
        );
    }
}
