use std::time::{Duration, Instant};

/// Monotonic time source for reading timestamps.
pub trait Clock {
    /// Current monotonic instant.
    fn now(&mut self) -> Instant;
}

/// Wall-independent system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> Instant {
        Instant::now()
    }
}

/// Clock advancing by a fixed step on every query.
#[derive(Debug, Clone)]
pub struct SteppedClock {
    origin: Instant,
    step: Duration,
    ticks: u32,
}

impl SteppedClock {
    /// Creates a clock whose successive readings are `step` apart.
    pub fn new(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            step,
            ticks: 0,
        }
    }
}

impl Clock for SteppedClock {
    fn now(&mut self) -> Instant {
        let now = self.origin + self.step * self.ticks;
        self.ticks += 1;
        now
    }
}

/// Minutes between `start` and `now`.
pub fn elapsed_minutes(start: Instant, now: Instant) -> f64 {
    now.saturating_duration_since(start).as_secs_f64() / 60.0
}
