//! Explicit time source and scheduled tasks.
//!
//! Timers are plain data (next fire time plus a cancellation token) checked
//! by the owner on each poll, so tests can drive them with [`ManualClock`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone)]
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
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A one-shot task due at a fixed time.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    fire_at_ms: u64,
    token: CancellationToken,
}

impl ScheduledTask {
    pub fn at(fire_at_ms: u64) -> Self {
        Self {
            fire_at_ms,
            token: CancellationToken::new(),
        }
    }

    pub fn fire_at_ms(&self) -> u64 {
        self.fire_at_ms
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Due and not cancelled.
    pub fn is_due(&self, now_ms: u64) -> bool {
        !self.token.is_cancelled() && now_ms >= self.fire_at_ms
    }
}

/// A repeating task with a fixed period.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    period_ms: u64,
    next_fire_ms: u64,
}

impl PeriodicTask {
    /// First fire one period after `now_ms`.
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            period_ms,
            next_fire_ms: now_ms + period_ms,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn next_fire_ms(&self) -> u64 {
        self.next_fire_ms
    }

    /// Returns `true` once per elapsed period. Missed periods are not replayed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_fire_ms {
            return false;
        }
        self.next_fire_ms = now_ms + self.period_ms;
        true
    }
}
