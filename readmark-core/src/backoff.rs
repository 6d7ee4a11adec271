//! Retry backoff for remote notification.
//!
//! Exponential backoff with random jitter so that many clients coming back
//! online after a homeserver outage do not retry in lockstep.

use std::time::Duration;

/// Backoff schedule for retryable remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for the exponential part.
    pub max: Duration,
}

impl Backoff {
    /// Create a schedule.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Formula: min(max, initial * 2^(attempt-1)) + random(0..=initial/2)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_cap = (self.initial.as_millis() / 2) as u64;
        base + Duration::from_millis(random_jitter_ms(jitter_cap))
    }

    /// Delay without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

/// Random jitter between 0 and `cap` milliseconds inclusive.
fn random_jitter_ms(cap: u64) -> u64 {
    if cap == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % (cap + 1)
}
