//! Verdict scoring for incoming event payloads.
//!
//! Features are extracted with the same code the sensor uses locally, then
//! compared against typical human timing. Trust moves per payload and decays
//! while a client is idle.

use crate::config::AnalyzerSettings;
use crate::core::{compute_session_metrics, AnalysisResponse, FocusLevel, SessionMetrics};
use crate::transport::StreamPayload;
use serde::{Deserialize, Serialize};

/// Trust penalty for bot-like input.
pub const BOT_PENALTY: i32 = -30;

/// Trust penalty for input far from typical human timing.
pub const OUTLIER_PENALTY: i32 = -10;

/// Trust reward for ordinary input.
pub const HUMAN_REWARD: i32 = 1;

/// Trust penalty for a device event flagged as an injection device.
pub const SUSPICIOUS_USB_PENALTY: i32 = -20;

/// Trust penalty for any other device event.
pub const USB_PENALTY: i32 = -5;

/// Trust penalty for an unparsable message.
pub const INVALID_MESSAGE_PENALTY: i32 = -2;

/// Flight-time spread below which key timing counts as perfectly regular.
/// Absorbs rounding from the seconds-based wire format.
pub const PERFECT_RHYTHM_EPSILON_MS: f64 = 1e-6;

/// |z| above which a feature marks the payload as an outlier.
pub const OUTLIER_Z: f64 = 3.0;

/// Mean and spread of one feature in ordinary human input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    pub mean: f64,
    pub std_dev: f64,
}

impl Prior {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Flight time, milliseconds.
pub const FLIGHT_PRIOR: Prior = Prior::new(120.0, 40.0);
/// Dwell time, milliseconds.
pub const DWELL_PRIOR: Prior = Prior::new(90.0, 30.0);
/// Flight-time standard deviation, milliseconds.
pub const RHYTHM_PRIOR: Prior = Prior::new(50.0, 35.0);
/// Pointer speed, px/ms.
pub const VELOCITY_PRIOR: Prior = Prior::new(0.35, 0.15);

/// The four features scored per payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub avg_flight: f64,
    pub avg_dwell: f64,
    pub rhythm_variance: f64,
    pub mouse_velocity: f64,
}

impl FeatureVector {
    pub fn from_metrics(metrics: &SessionMetrics) -> Self {
        Self {
            avg_flight: metrics.avg_flight_time,
            avg_dwell: metrics.avg_dwell_time,
            rhythm_variance: metrics.rhythm_variance,
            mouse_velocity: metrics.mouse.avg_velocity,
        }
    }
}

/// Per-client trust score, clamped to the configured bounds.
#[derive(Debug, Clone)]
pub struct TrustLedger {
    score: i32,
    min: i32,
    max: i32,
}

impl TrustLedger {
    pub fn new(settings: &AnalyzerSettings) -> Self {
        Self {
            score: settings.initial_trust.clamp(settings.trust_min, settings.trust_max),
            min: settings.trust_min,
            max: settings.trust_max,
        }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    /// Apply `delta` and return the change actually made after clamping.
    pub fn adjust(&mut self, delta: i32) -> i32 {
        let before = self.score;
        self.score = before.saturating_add(delta).clamp(self.min, self.max);
        self.score - before
    }
}

/// Why a payload was judged machine-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotSignal {
    PerfectRhythm,
    InjectedKeys,
    LinearPointer,
}

impl BotSignal {
    fn describe(self) -> &'static str {
        match self {
            BotSignal::PerfectRhythm => "key timing is perfectly regular",
            BotSignal::InjectedKeys => "key events were injected",
            BotSignal::LinearPointer => "pointer moves in fast straight lines",
        }
    }
}

/// Outcome of one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub response: AnalysisResponse,
    pub features: FeatureVector,
    pub signal: Option<BotSignal>,
    pub outlier: bool,
}

/// Stateless scorer; trust lives in the caller's [`TrustLedger`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzerEngine {
    settings: AnalyzerSettings,
}

impl AnalyzerEngine {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Score one payload and move the ledger.
    pub fn analyze(&self, payload: &StreamPayload, ledger: &mut TrustLedger) -> Assessment {
        let (keys, mouse) = payload.to_events();
        let metrics = compute_session_metrics(&keys, &mouse, false);
        let features = FeatureVector::from_metrics(&metrics);

        let signal = self.bot_signal(&metrics, mouse.len());
        let (risk, outlier) = deviation_risk(&metrics, mouse.len());

        let delta = if let Some(usb) = &payload.usb_event {
            if usb.is_suspicious {
                SUSPICIOUS_USB_PENALTY
            } else {
                USB_PENALTY
            }
        } else if signal.is_some() {
            BOT_PENALTY
        } else if outlier {
            OUTLIER_PENALTY
        } else {
            HUMAN_REWARD
        };
        let applied = ledger.adjust(delta);

        let summary = match (signal, &payload.usb_event) {
            (_, Some(usb)) if usb.is_suspicious => "Suspicious device attached".to_string(),
            (Some(signal), _) => format!("Bot-like input: {}", signal.describe()),
            (None, Some(_)) => "Device attached".to_string(),
            (None, None) if outlier => {
                "Input deviates strongly from typical human timing".to_string()
            }
            (None, None) => format!(
                "Input consistent with human behavior ({:.0} wpm)",
                metrics.wpm
            ),
        };

        let response = AnalysisResponse {
            current_activity: activity_label(keys.len(), mouse.len()).to_string(),
            focus_level: FocusLevel::from_risk(risk),
            risk_score: risk,
            trust_score: ledger.score(),
            trust_delta: applied,
            summary,
            bot_detected: signal.is_some(),
            detected_apps: Vec::new(),
        };

        Assessment {
            response,
            features,
            signal,
            outlier,
        }
    }

    /// Penalise an unparsable message. Returns the new score.
    pub fn reject_invalid(&self, ledger: &mut TrustLedger) -> i32 {
        ledger.adjust(INVALID_MESSAGE_PENALTY);
        ledger.score()
    }

    /// Apply one idle-window decay. Returns the new score.
    pub fn decay_idle(&self, ledger: &mut TrustLedger) -> i32 {
        ledger.adjust(-self.settings.idle_decay_points);
        ledger.score()
    }

    fn bot_signal(&self, metrics: &SessionMetrics, mouse_samples: usize) -> Option<BotSignal> {
        if metrics.synthetic_key_count > 0 {
            return Some(BotSignal::InjectedKeys);
        }
        if metrics.flight_sample_count >= 2
            && metrics.rhythm_variance < PERFECT_RHYTHM_EPSILON_MS
        {
            return Some(BotSignal::PerfectRhythm);
        }
        let mouse = &metrics.mouse;
        if mouse_samples >= 2
            && mouse.avg_velocity >= self.settings.bot_velocity_threshold
            && mouse.avg_angular_velocity <= self.settings.bot_angular_epsilon
        {
            return Some(BotSignal::LinearPointer);
        }
        None
    }
}

/// Risk in 0..=100 from the mean |z| of the features present, and whether
/// any single feature is beyond [`OUTLIER_Z`].
fn deviation_risk(metrics: &SessionMetrics, mouse_samples: usize) -> (f64, bool) {
    let mut z_scores = Vec::with_capacity(4);
    if metrics.flight_sample_count > 0 {
        z_scores.push(FLIGHT_PRIOR.z_score(metrics.avg_flight_time).abs());
        z_scores.push(RHYTHM_PRIOR.z_score(metrics.rhythm_variance).abs());
    }
    if metrics.avg_dwell_time > 0.0 {
        z_scores.push(DWELL_PRIOR.z_score(metrics.avg_dwell_time).abs());
    }
    if mouse_samples >= 2 {
        z_scores.push(VELOCITY_PRIOR.z_score(metrics.mouse.avg_velocity).abs());
    }

    if z_scores.is_empty() {
        return (0.0, false);
    }

    let mean_z = z_scores.iter().sum::<f64>() / z_scores.len() as f64;
    let outlier = z_scores.iter().any(|z| *z > OUTLIER_Z);
    let risk = (mean_z / OUTLIER_Z * 100.0).clamp(0.0, 100.0);
    (risk, outlier)
}

fn activity_label(keys: usize, mouse: usize) -> &'static str {
    match (keys > 0, mouse > 0) {
        (true, true) => "Typing and pointing",
        (true, false) => "Typing",
        (false, true) => "Pointing",
        (false, false) => "Idle",
    }
}
