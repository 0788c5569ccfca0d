//! Session activity counters.
//!
//! Counts what was captured and sent without recording any of the content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for the current monitoring session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of key transitions recorded
    key_events: AtomicU64,
    /// Number of pointer samples recorded
    mouse_events: AtomicU64,
    /// Number of payloads handed to the transport
    payloads_sent: AtomicU64,
    /// Number of verdicts received from the analyzer
    verdicts_received: AtomicU64,
    /// Number of transport failures reported
    transport_errors: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            key_events: AtomicU64::new(0),
            mouse_events: AtomicU64::new(0),
            payloads_sent: AtomicU64::new(0),
            verdicts_received: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Counters that accumulate across runs in a JSON file at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {}", e);
        }

        log
    }

    /// Record a key transition.
    pub fn record_key_event(&self) {
        self.key_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pointer sample.
    pub fn record_mouse_event(&self) {
        self.mouse_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload handed to the transport.
    pub fn record_payload_sent(&self) {
        self.payloads_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record received verdicts.
    pub fn record_verdicts(&self, count: u64) {
        self.verdicts_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a transport failure.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            key_events: self.key_events.load(Ordering::Relaxed),
            mouse_events: self.mouse_events.load(Ordering::Relaxed),
            payloads_sent: self.payloads_sent.load(Ordering::Relaxed),
            verdicts_received: self.verdicts_received.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Key transitions captured: {}\n\
             - Pointer samples captured: {}\n\
             - Payloads streamed: {}\n\
             - Verdicts received: {}\n\
             - Transport errors: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Outbound Data:\n\
             - Key labels and timestamps of the most recent transitions\n\
             - Pointer coordinates and timestamps of the most recent samples\n\
             - Key labels replaced by short pseudonyms in privacy mode",
            stats.key_events,
            stats.mouse_events,
            stats.payloads_sent,
            stats.verdicts_received,
            stats.transport_errors,
            stats.session_duration_secs
        )
    }

    /// Write counters to disk when persistence is enabled.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = self.persist_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stats = self.stats();
        let persisted = PersistedStats {
            key_events: stats.key_events,
            mouse_events: stats.mouse_events,
            payloads_sent: stats.payloads_sent,
            verdicts_received: stats.verdicts_received,
            transport_errors: stats.transport_errors,
            last_updated: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load counters written by an earlier run.
    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(path) = self.persist_path.as_ref() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedStats =
            serde_json::from_str(&content).map_err(std::io::Error::other)?;

        self.key_events
            .store(persisted.key_events, Ordering::Relaxed);
        self.mouse_events
            .store(persisted.mouse_events, Ordering::Relaxed);
        self.payloads_sent
            .store(persisted.payloads_sent, Ordering::Relaxed);
        self.verdicts_received
            .store(persisted.verdicts_received, Ordering::Relaxed);
        self.transport_errors
            .store(persisted.transport_errors, Ordering::Relaxed);
        Ok(())
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.key_events.store(0, Ordering::Relaxed);
        self.mouse_events.store(0, Ordering::Relaxed);
        self.payloads_sent.store(0, Ordering::Relaxed);
        self.verdicts_received.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    /// Key transitions recorded
    pub key_events: u64,
    /// Pointer samples recorded
    pub mouse_events: u64,
    /// Payloads handed to the transport
    pub payloads_sent: u64,
    /// Verdicts received from the analyzer
    pub verdicts_received: u64,
    /// Transport failures reported
    pub transport_errors: u64,
    /// Session start time
    pub session_start: DateTime<Utc>,
    /// Session duration in seconds
    pub session_duration_secs: u64,
}

/// On-disk form of the counters.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    key_events: u64,
    mouse_events: u64,
    payloads_sent: u64,
    verdicts_received: u64,
    #[serde(default)]
    transport_errors: u64,
    last_updated: DateTime<Utc>,
}

/// Transparency log shared with the transport observer.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a shared transparency log, persisted when a path is given.
pub fn create_shared_log(persist_path: Option<PathBuf>) -> SharedTransparencyLog {
    Arc::new(match persist_path {
        Some(path) => TransparencyLog::with_persistence(path),
        None => TransparencyLog::new(),
    })
}
