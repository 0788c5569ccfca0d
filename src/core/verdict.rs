//! Analyzer verdicts and the trust state they drive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest trust score.
pub const TRUST_MIN: i32 = 0;

/// Highest trust score.
pub const TRUST_MAX: i32 = 100;

/// Trust score before any verdict arrives.
pub const TRUST_INITIAL: i32 = 80;

/// Attention level reported by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusLevel {
    High,
    Medium,
    Distracted,
}

impl FocusLevel {
    /// Map a 0-100 risk score onto a focus level.
    pub fn from_risk(risk: f64) -> Self {
        if risk < 30.0 {
            FocusLevel::High
        } else if risk < 60.0 {
            FocusLevel::Medium
        } else {
            FocusLevel::Distracted
        }
    }
}

impl fmt::Display for FocusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FocusLevel::High => "High",
            FocusLevel::Medium => "Medium",
            FocusLevel::Distracted => "Distracted",
        };
        f.write_str(label)
    }
}

/// One verdict from the remote analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub current_activity: String,
    pub focus_level: FocusLevel,
    /// 0-100, higher is riskier
    pub risk_score: f64,
    /// 0-100
    pub trust_score: i32,
    #[serde(rename = "trustScoreAdjustment")]
    pub trust_delta: i32,
    pub summary: String,
    #[serde(rename = "isBotDetected")]
    pub bot_detected: bool,
    #[serde(default)]
    pub detected_apps: Vec<String>,
}

/// Running trust state for a monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustState {
    pub score: i32,
    pub last_delta: i32,
    pub verdicts: u64,
    pub bot_verdicts: u64,
    pub focus: Option<FocusLevel>,
}

impl Default for TrustState {
    fn default() -> Self {
        Self {
            score: TRUST_INITIAL,
            last_delta: 0,
            verdicts: 0,
            bot_verdicts: 0,
            focus: None,
        }
    }
}

impl TrustState {
    /// Adopt the analyzer's trust score.
    pub fn apply(&mut self, verdict: &AnalysisResponse) {
        let score = verdict.trust_score.clamp(TRUST_MIN, TRUST_MAX);
        self.last_delta = score - self.score;
        self.score = score;
        self.verdicts += 1;
        if verdict.bot_detected {
            self.bot_verdicts += 1;
        }
        self.focus = Some(verdict.focus_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(trust: i32, bot: bool) -> AnalysisResponse {
        AnalysisResponse {
            current_activity: "Monitoring".to_string(),
            focus_level: FocusLevel::Medium,
            risk_score: 40.0,
            trust_score: trust,
            trust_delta: 0,
            summary: "processed".to_string(),
            bot_detected: bot,
            detected_apps: Vec::new(),
        }
    }

    #[test]
    fn test_focus_from_risk() {
        assert_eq!(FocusLevel::from_risk(0.0), FocusLevel::High);
        assert_eq!(FocusLevel::from_risk(29.9), FocusLevel::High);
        assert_eq!(FocusLevel::from_risk(30.0), FocusLevel::Medium);
        assert_eq!(FocusLevel::from_risk(60.0), FocusLevel::Distracted);
    }

    #[test]
    fn test_trust_state_apply() {
        let mut state = TrustState::default();
        state.apply(&verdict(50, true));
        assert_eq!(state.score, 50);
        assert_eq!(state.last_delta, -30);
        assert_eq!(state.bot_verdicts, 1);
        assert_eq!(state.focus, Some(FocusLevel::Medium));

        state.apply(&verdict(140, false));
        assert_eq!(state.score, TRUST_MAX);
        assert_eq!(state.verdicts, 2);
    }

    #[test]
    fn test_response_wire_names() {
        let json = r#"{
            "currentActivity": "Monitoring",
            "focusLevel": "High",
            "riskScore": 12.5,
            "trustScore": 81,
            "trustScoreAdjustment": 1,
            "summary": "processed",
            "isBotDetected": false,
            "detectedApps": []
        }"#;
        let response: AnalysisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.focus_level, FocusLevel::High);
        assert_eq!(response.trust_delta, 1);
        assert!(!response.bot_detected);
    }
}
