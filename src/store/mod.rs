//! Persistence for the activity history and the long-run profile.
//!
//! `ProfileStore` is the only writer to durable storage. Reads never fail:
//! unreadable data degrades to an empty history or a zeroed profile.

pub mod backend;
pub mod encoding;
pub mod records;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use records::{ActivityLog, UserProfile};

use crate::core::features::SessionMetrics;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of activity entries kept, newest first.
pub const MAX_ACTIVITY_LOGS: usize = 50;

/// Record key for the activity history.
pub const LOGS_KEY: &str = "activity_logs";

/// Record key for the biometric profile.
pub const PROFILE_KEY: &str = "user_profile";

/// Errors that can occur while persisting records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Owner of persisted session history.
pub struct ProfileStore {
    backend: Box<dyn StorageBackend>,
}

impl ProfileStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Store records as JSON files under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(dir))
    }

    /// Store records in memory only.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Prepend a verdict record and persist the capped history.
    ///
    /// Returns the history as persisted.
    pub fn append_log(
        &mut self,
        mut entry: ActivityLog,
        opaque: bool,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        entry.encrypted = opaque;

        let mut logs = self.read_logs(opaque);
        logs.insert(0, entry);
        logs.truncate(MAX_ACTIVITY_LOGS);

        let json = serde_json::to_string(&logs)?;
        let stored = if opaque { encoding::encode(&json) } else { json };
        self.backend.write(LOGS_KEY, &stored)?;

        Ok(logs)
    }

    /// Read the activity history, newest first.
    ///
    /// Tries the requested encoding first and the other one second, so a
    /// history written in either mode stays readable.
    pub fn read_logs(&self, opaque: bool) -> Vec<ActivityLog> {
        let raw = match self.backend.read(LOGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read activity history");
                return Vec::new();
            }
        };

        let opaque_read = || {
            encoding::decode(&raw).and_then(|json| {
                serde_json::from_str::<Vec<ActivityLog>>(&json).map_err(StoreError::from)
            })
        };
        let plain_read =
            || serde_json::from_str::<Vec<ActivityLog>>(&raw).map_err(StoreError::from);

        let decoded = if opaque {
            opaque_read().or_else(|e| {
                tracing::debug!(error = %e, "activity history not opaque, trying plain");
                plain_read()
            })
        } else {
            plain_read().or_else(|e| {
                tracing::debug!(error = %e, "activity history not plain, trying opaque");
                opaque_read()
            })
        };

        decoded.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "activity history unreadable, starting empty");
            Vec::new()
        })
    }

    /// Remove the activity history.
    pub fn clear_logs(&mut self) -> Result<(), StoreError> {
        self.backend.remove(LOGS_KEY)
    }

    /// Current baseline, or a zeroed profile when none is stored or readable.
    pub fn read_profile(&self) -> UserProfile {
        match self.backend.read(PROFILE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "profile unreadable, using empty baseline");
                UserProfile::default()
            }),
            Ok(None) => UserProfile::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read profile");
                UserProfile::default()
            }
        }
    }

    /// Fold a finished session into the baseline and persist it.
    pub fn update_profile(&mut self, metrics: &SessionMetrics) -> Result<UserProfile, StoreError> {
        self.update_profile_at(metrics, Utc::now())
    }

    /// [`update_profile`](Self::update_profile) with an explicit timestamp.
    pub fn update_profile_at(
        &mut self,
        metrics: &SessionMetrics,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let profile = self.read_profile().absorb(metrics, now);
        let json = serde_json::to_string_pretty(&profile)?;
        self.backend.write(PROFILE_KEY, &json)?;
        Ok(profile)
    }
}
