//! Reconnect backoff policy.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff with a cap and additive jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay unit in milliseconds, doubled per attempt
    pub base_ms: u64,
    /// Upper bound before jitter, in milliseconds
    pub max_ms: u64,
    /// Largest random addition, in milliseconds
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_ms: 8000,
            jitter_ms: 250,
        }
    }
}

impl BackoffConfig {
    /// Delay before jitter for `attempt`: `min(max, base * 2^attempt)`.
    pub fn capped_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }

    /// Delay for `attempt` including jitter in `[0, jitter_ms]`.
    pub fn delay_ms<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> u64 {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.jitter_ms)
        };
        self.capped_delay_ms(attempt) + jitter
    }
}
