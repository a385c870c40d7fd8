use std::time::{Duration, Instant};

/// Monotonic time source of the consume loops.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// What is left from `budget` started at `start`. A clock which went backwards leaves nothing.
pub(crate) fn remaining(budget: Duration, start: Instant, now: Instant) -> Duration {
    now.checked_duration_since(start)
        .map_or(Duration::ZERO, |elapsed| budget.saturating_sub(elapsed))
}
