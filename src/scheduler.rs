//! Injectable clock and keyed timer queue
//!
//! Every deferred side effect in the backend (the untrack debounce, the
//! error/warning aggregation debounce, the bridge's batching timer) is an
//! entry in a [`TimerQueue`] read against a [`Clock`]. Nothing here spawns
//! threads or sleeps: the owner polls [`TimerQueue::take_due`] from its own
//! tick, which keeps the host's commit path non-blocking and lets tests
//! drive time with a [`ManualClock`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same time cell, so a test can keep one handle and hand
/// another to the session.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Shared clock handle
pub type SharedClock = Rc<dyn Clock>;

/// Convert a duration to fractional milliseconds
#[inline]
pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Keyed one-shot timers
///
/// At most one timer exists per key. [`schedule`](Self::schedule) cancels and
/// replaces an existing timer; [`schedule_if_idle`](Self::schedule_if_idle)
/// keeps it, so later requests join the batch the first request started.
pub struct TimerQueue<K> {
    timers: Vec<(K, Duration)>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<K: fmt::Debug> fmt::Debug for TimerQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("timers", &self.timers)
            .finish()
    }
}

impl<K: Copy + PartialEq> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `deadline`, replacing any existing timer for it
    pub fn schedule(&mut self, key: K, deadline: Duration) {
        self.cancel(key);
        self.timers.push((key, deadline));
    }

    /// Schedule `key` at `deadline` unless a timer for it is already pending.
    /// Returns true if a new timer was created.
    pub fn schedule_if_idle(&mut self, key: K, deadline: Duration) -> bool {
        if self.is_scheduled(key) {
            return false;
        }
        self.timers.push((key, deadline));
        true
    }

    /// Cancel the timer for `key`. Returns true if one was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.timers.len();
        self.timers.retain(|(k, _)| *k != key);
        before != self.timers.len()
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.timers.iter().any(|(k, _)| *k == key)
    }

    /// Deadline of the timer for `key`, if pending
    pub fn deadline(&self, key: K) -> Option<Duration> {
        self.timers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, d)| *d)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|(_, d)| *d).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_due(&mut self, now: Duration) -> Vec<K> {
        let mut due: Vec<(K, Duration)> = Vec::new();
        self.timers.retain(|&(k, d)| {
            if d <= now {
                due.push((k, d));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, d)| d);
        due.into_iter().map(|(k, _)| k).collect()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
