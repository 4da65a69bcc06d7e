//! Log rate limiting for the connect loop.
//!
//! Under a prolonged outage the connect loop retries every second; the
//! throttle lets one warning through per window. Each transport owns its own
//! throttle. The clock is injectable through [`LogThrottle::allow_at`].

use std::time::Duration;

use tokio::time::Instant;

/// Allows one event per `period`.
#[derive(Debug)]
pub struct LogThrottle {
    period: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Whether an event may be logged now.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Whether an event may be logged at `now`. Records the event if so.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
