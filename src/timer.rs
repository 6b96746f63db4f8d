use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

/// Time source for the session: a monotonic reading for measuring latency and
/// a wall-clock reading for timestamps on results.
pub trait Clock {
    /// Monotonic time since a fixed, arbitrary origin
    fn elapsed(&self) -> Duration;
    fn wall(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic tests. Clones share the same reading.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
    wall_origin: DateTime<Utc>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(Duration::ZERO)),
            wall_origin,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(self.now.get()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }
}

/// Identifies one scheduled callback so it can be cancelled or matched when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    StimulusOnset,
    ResponseTimeout,
}

/// One-shot, cancellable timers keyed by absolute deadlines on a [`Clock`]
pub trait Scheduler {
    fn schedule(&mut self, deadline: Duration, event: TimerEvent) -> TimerHandle;
    /// Returns false when the handle already fired or was never armed
    fn cancel(&mut self, handle: TimerHandle) -> bool;
    /// Removes and returns every timer whose deadline is at or before `now`,
    /// earliest first
    fn take_due(&mut self, now: Duration) -> Vec<(TimerHandle, TimerEvent)>;
    fn next_deadline(&self) -> Option<Duration>;
    fn pending(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Pending {
    handle: TimerHandle,
    deadline: Duration,
    event: TimerEvent,
}

/// Polled timer queue, drained from the application's tick
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: Vec<Pending>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, deadline: Duration, event: TimerEvent) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending.push(Pending {
            handle,
            deadline,
            event,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    fn take_due(&mut self, now: Duration) -> Vec<(TimerHandle, TimerEvent)> {
        let (due, rest): (Vec<Pending>, Vec<Pending>) =
            self.pending.drain(..).partition(|p| p.deadline <= now);
        self.pending = rest;

        due.into_iter()
            .sorted_by_key(|p| (p.deadline, p.handle))
            .map(|p| (p.handle, p.event))
            .collect()
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}
