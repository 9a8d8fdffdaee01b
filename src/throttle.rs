use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Lets a copy round through at most once per one-second tick. The first
/// round waits a full tick, like a ticker that has not fired yet.
pub struct ThrottleGate {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    bytes_per_tick: u64,
}

impl ThrottleGate {
    pub fn per_second(bytes_per_tick: u64) -> Self {
        let limiter = RateLimiter::direct(Quota::per_second(NonZeroU32::MIN));
        // Spend the burst cell so the first round waits out a whole tick.
        let _ = limiter.check();

        Self {
            limiter,
            bytes_per_tick,
        }
    }

    /// Bytes a single round may copy.
    pub fn bytes_per_tick(&self) -> u64 {
        self.bytes_per_tick
    }

    pub async fn tick(&self) {
        self.limiter.until_ready().await;
    }
}
