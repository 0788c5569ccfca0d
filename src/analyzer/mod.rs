//! Reference analyzer.
//!
//! Scores streamed payloads with [`AnalyzerEngine`] and answers each one with
//! a verdict line. The TCP front end lives in [`server`] behind the `server`
//! feature.

pub mod engine;
#[cfg(feature = "server")]
pub mod server;

pub use engine::{AnalyzerEngine, Assessment, BotSignal, FeatureVector, TrustLedger};

use crate::core::AnalysisResponse;
use crate::transport::StreamPayload;
use serde::{Deserialize, Serialize};

/// Successful reply: the verdict plus the features behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictMessage {
    pub ok: bool,
    #[serde(flatten)]
    pub response: AnalysisResponse,
    pub features: FeatureVector,
}

/// Reply to a message that could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub ok: bool,
    pub error: String,
    pub trust_score: i32,
}

/// Reply for one inbound line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Verdict(VerdictMessage),
    Error(ErrorMessage),
}

impl AnalyzerEngine {
    /// Parse one inbound line, score it and build the reply.
    pub fn respond(&self, line: &str, ledger: &mut TrustLedger) -> Reply {
        match serde_json::from_str::<StreamPayload>(line) {
            Ok(payload) => {
                let assessment = self.analyze(&payload, ledger);
                Reply::Verdict(VerdictMessage {
                    ok: true,
                    response: assessment.response,
                    features: assessment.features,
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "invalid payload");
                Reply::Error(ErrorMessage {
                    ok: false,
                    error: "invalid_json".to_string(),
                    trust_score: self.reject_invalid(ledger),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerSettings;
    use crate::transport::{parse_verdict, TransportError};

    #[test]
    fn test_verdict_reply_parses_on_the_client() {
        let engine = AnalyzerEngine::new(AnalyzerSettings::default());
        let mut ledger = TrustLedger::new(engine.settings());

        let reply = engine.respond(r#"{"keystrokes":[],"mouse":[]}"#, &mut ledger);
        let text = serde_json::to_string(&reply).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json["features"].is_object());

        let verdict = parse_verdict(&text).unwrap();
        assert_eq!(verdict.trust_score, 81);
    }

    #[test]
    fn test_invalid_json_reply() {
        let engine = AnalyzerEngine::new(AnalyzerSettings::default());
        let mut ledger = TrustLedger::new(engine.settings());

        let reply = engine.respond("{not json", &mut ledger);
        assert_eq!(
            reply,
            Reply::Error(ErrorMessage {
                ok: false,
                error: "invalid_json".to_string(),
                trust_score: 78,
            })
        );

        let text = serde_json::to_string(&reply).unwrap();
        assert!(text.contains(r#""trustScore":78"#));
        assert_eq!(
            parse_verdict(&text),
            Err(TransportError::Rejected("invalid_json".to_string()))
        );
    }
}
