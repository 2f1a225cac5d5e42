//! Monotonic clock abstraction.
//!
//! Every time-dependent decision in the pipeline (flush timeouts, telemetry
//! staleness, retime windows, segment eviction) reads time through this trait
//! so tests can drive it deterministically.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// System monotonic clock.
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for deterministic tests. Time only moves when the
/// test calls [`ManualClock::advance`].
pub struct ManualClock {
    current: parking_lot::Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            current: parking_lot::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.current.lock();
        *now += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}

/// Clock handle shared across pipeline components.
pub type SharedClock = Arc<dyn Clock>;

pub fn monotonic_clock() -> SharedClock {
    Arc::new(MonotonicClock::new())
}

/// Returns the concrete handle so tests can advance it, usable anywhere a
/// [`SharedClock`] is expected via `clone()` coercion.
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}
