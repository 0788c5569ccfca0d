//! Wire messages exchanged with the analyzer.
//!
//! Outbound: a recent slice of key transitions and pointer samples, with
//! timestamps in seconds. Inbound: a success-tagged verdict.

use crate::collector::{KeyDirection, KeyEvent, MouseEventData};
use crate::core::privacy::hash_key_code;
use crate::core::AnalysisResponse;
use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystrokeKind {
    Keydown,
    Keyup,
}

impl From<KeyDirection> for KeystrokeKind {
    fn from(direction: KeyDirection) -> Self {
        match direction {
            KeyDirection::Down => KeystrokeKind::Keydown,
            KeyDirection::Up => KeystrokeKind::Keyup,
        }
    }
}

impl From<KeystrokeKind> for KeyDirection {
    fn from(kind: KeystrokeKind) -> Self {
        match kind {
            KeystrokeKind::Keydown => KeyDirection::Down,
            KeystrokeKind::Keyup => KeyDirection::Up,
        }
    }
}

/// One key transition on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeRecord {
    #[serde(rename = "type")]
    pub kind: KeystrokeKind,
    pub key: String,
    /// Seconds
    pub timestamp: f64,
    /// Reported by the source as injected
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthetic: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl KeystrokeRecord {
    pub fn new(kind: KeystrokeKind, key: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind,
            key: key.into(),
            timestamp,
            synthetic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerRecord {
    pub x: f64,
    pub y: f64,
    /// Seconds
    pub timestamp: f64,
}

/// A peripheral attached to the monitored machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbEvent {
    /// Device description as reported by the host, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Flagged by the host as a known injection device
    #[serde(default)]
    pub is_suspicious: bool,
}

/// Periodic outbound payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    #[serde(default)]
    pub keystrokes: Vec<KeystrokeRecord>,
    #[serde(default)]
    pub mouse: Vec<PointerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_event: Option<UsbEvent>,
}

impl StreamPayload {
    /// Build a payload from buffered events.
    ///
    /// In privacy mode the key label is replaced by the pseudonym of the
    /// physical code so no typed characters leave the process.
    pub fn from_recent<'a>(
        keys: impl IntoIterator<Item = &'a KeyEvent>,
        mouse: impl IntoIterator<Item = &'a MouseEventData>,
        privacy_mode: bool,
    ) -> Self {
        let keystrokes = keys
            .into_iter()
            .map(|event| KeystrokeRecord {
                kind: event.direction.into(),
                key: if privacy_mode {
                    hash_key_code(&event.code)
                } else {
                    event.key.clone()
                },
                timestamp: event.timestamp / 1000.0,
                synthetic: event.synthetic,
            })
            .collect();

        let mouse = mouse
            .into_iter()
            .map(|sample| PointerRecord {
                x: sample.x,
                y: sample.y,
                timestamp: sample.timestamp / 1000.0,
            })
            .collect();

        Self {
            keystrokes,
            mouse,
            usb_event: None,
        }
    }

    /// Attach a device event to this payload.
    pub fn with_usb_event(mut self, event: UsbEvent) -> Self {
        self.usb_event = Some(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keystrokes.is_empty() && self.mouse.is_empty() && self.usb_event.is_none()
    }

    /// Convert back to millisecond events. The wire label stands in for
    /// both key and code.
    pub fn to_events(&self) -> (Vec<KeyEvent>, Vec<MouseEventData>) {
        let keys = self
            .keystrokes
            .iter()
            .map(|record| KeyEvent {
                key: record.key.clone(),
                code: record.key.clone(),
                timestamp: record.timestamp * 1000.0,
                direction: record.kind.into(),
                synthetic: record.synthetic,
            })
            .collect();

        let mouse = self
            .mouse
            .iter()
            .map(|record| MouseEventData::new(record.x, record.y, record.timestamp * 1000.0))
            .collect();

        (keys, mouse)
    }
}

/// Parse an inbound verdict.
///
/// The message must carry `"ok": true`. An explicit `"ok": false` is a
/// rejection; anything else is malformed.
pub fn parse_verdict(text: &str) -> Result<AnalysisResponse, TransportError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| TransportError::Malformed(e.to_string()))?;

    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => {}
        Some(false) => {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_string();
            return Err(TransportError::Rejected(reason));
        }
        None => {
            return Err(TransportError::Malformed(
                "missing success marker".to_string(),
            ))
        }
    }

    serde_json::from_value(value).map_err(|e| TransportError::Malformed(e.to_string()))
}
