//! Persisted record shapes.

use crate::core::features::SessionMetrics;
use crate::core::verdict::{AnalysisResponse, FocusLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyzer verdict as kept in the activity history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub timestamp: DateTime<Utc>,
    pub activity: String,
    pub focus_level: FocusLevel,
    /// 0-100
    pub risk_score: f64,
    /// 0-100
    pub trust_score: i32,
    pub justification: String,
    /// Whether the history was persisted with the opaque encoding
    #[serde(default)]
    pub encrypted: bool,
}

impl ActivityLog {
    /// Build a log entry from a verdict received at `timestamp`.
    pub fn from_verdict(verdict: &AnalysisResponse, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            activity: verdict.current_activity.clone(),
            focus_level: verdict.focus_level,
            risk_score: verdict.risk_score,
            trust_score: verdict.trust_score,
            justification: verdict.summary.clone(),
            encrypted: false,
        }
    }
}

/// Long-run biometric baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub avg_wpm: f64,
    /// Milliseconds
    pub avg_flight_time: f64,
    /// Pixels per millisecond
    pub avg_mouse_velocity: f64,
    pub total_sessions: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Fold one session into the cumulative averages.
    ///
    /// A session without flight samples leaves the flight average untouched.
    pub fn absorb(&self, metrics: &SessionMetrics, now: DateTime<Utc>) -> Self {
        let n = self.total_sessions as f64;
        let next = n + 1.0;
        let mean = |old: f64, current: f64| (old * n + current) / next;

        let avg_flight_time = if metrics.avg_flight_time == 0.0 {
            self.avg_flight_time
        } else {
            mean(self.avg_flight_time, metrics.avg_flight_time)
        };

        Self {
            avg_wpm: mean(self.avg_wpm, metrics.wpm),
            avg_flight_time,
            avg_mouse_velocity: mean(self.avg_mouse_velocity, metrics.mouse.avg_velocity),
            total_sessions: self.total_sessions + 1,
            last_seen: Some(now),
        }
    }
}
