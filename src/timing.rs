//! Reply timing window
//!
//! A Follower must not answer sooner than the configured delay after the
//! request arrived, and OpenTherm expects the answer within 800 ms. The
//! lower bound is a hard guarantee; overrunning the upper bound is logged as
//! a conformance defect and the reply still goes out.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

/// Monotonic time source with a cooperative sleep
pub trait Clock {
    /// Current monotonic time
    fn now(&self) -> Instant;

    /// Yield for at least `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Enforces the minimum reply latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingGate {
    delay: Duration,
}

impl TimingGate {
    /// Shortest delay the protocol allows
    pub const MIN_DELAY: Duration = Duration::from_millis(20);
    /// Longest delay the protocol allows
    pub const MAX_DELAY: Duration = Duration::from_millis(800);
    /// Deployment default
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(125);

    /// Create a gate with the given minimum delay
    pub fn new(delay: Duration) -> Self {
        TimingGate { delay }
    }

    /// Configured minimum delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time still to wait at `now` for a request received at `received_at`
    pub fn remaining(&self, received_at: Instant, now: Instant) -> Duration {
        self.delay
            .saturating_sub(now.saturating_duration_since(received_at))
    }

    /// Block until the reply may be sent; returns the total latency
    ///
    /// Returns immediately when processing already took longer than the
    /// delay.
    pub fn wait<C: Clock>(&self, clock: &C, received_at: Instant) -> Duration {
        loop {
            let now = clock.now();
            let remaining = self.remaining(received_at, now);
            if remaining.is_zero() {
                let latency = now.saturating_duration_since(received_at);
                if latency > Self::MAX_DELAY {
                    warn!(
                        latency_ms = latency.as_millis() as u64,
                        "reply later than the OpenTherm response window"
                    );
                }
                return latency;
            }
            trace!(remaining_us = remaining.as_micros() as u64, "holding reply");
            clock.sleep(remaining);
        }
    }
}

impl Default for TimingGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}
