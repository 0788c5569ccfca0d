//! Raw input event types captured from a monitored session.
//!
//! Timestamps are monotonic milliseconds as reported by the producing source.
//! Nothing here is derived; feature computation lives in `core::features`.

use serde::{Deserialize, Serialize};

/// Physical code reported for the backspace key.
pub const BACKSPACE_CODE: &str = "Backspace";

/// Direction of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDirection {
    Down,
    Up,
}

/// A single key transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key label as produced by the layout (e.g. "a", "Shift")
    pub key: String,
    /// Physical key code (e.g. "KeyA", "Backspace")
    pub code: String,
    /// Timestamp in milliseconds
    pub timestamp: f64,
    /// Press or release
    pub direction: KeyDirection,
    /// Set when the source reports the event as injected rather than device-originated
    #[serde(default)]
    pub synthetic: bool,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>, code: impl Into<String>, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            timestamp,
            direction: KeyDirection::Down,
            synthetic: false,
        }
    }

    pub fn up(key: impl Into<String>, code: impl Into<String>, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            timestamp,
            direction: KeyDirection::Up,
            synthetic: false,
        }
    }

    /// Mark this event as injected.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn is_down(&self) -> bool {
        self.direction == KeyDirection::Down
    }

    pub fn is_backspace(&self) -> bool {
        self.code == BACKSPACE_CODE
    }
}

/// One sampled pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEventData {
    pub x: f64,
    pub y: f64,
    /// Timestamp in milliseconds
    pub timestamp: f64,
}

impl MouseEventData {
    pub fn new(x: f64, y: f64, timestamp: f64) -> Self {
        Self { x, y, timestamp }
    }
}

/// Unified event type for the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    Key(KeyEvent),
    Mouse(MouseEventData),
}

impl SensorEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            SensorEvent::Key(e) => e.timestamp,
            SensorEvent::Mouse(e) => e.timestamp,
        }
    }
}

impl From<KeyEvent> for SensorEvent {
    fn from(event: KeyEvent) -> Self {
        SensorEvent::Key(event)
    }
}

impl From<MouseEventData> for SensorEvent {
    fn from(event: MouseEventData) -> Self {
        SensorEvent::Mouse(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_constructors() {
        let down = KeyEvent::down("a", "KeyA", 10.0);
        assert!(down.is_down());
        assert!(!down.synthetic);

        let up = KeyEvent::up("a", "KeyA", 20.0).synthetic();
        assert!(!up.is_down());
        assert!(up.synthetic);
    }

    #[test]
    fn test_backspace_detection() {
        assert!(KeyEvent::down("Backspace", "Backspace", 0.0).is_backspace());
        assert!(!KeyEvent::down("b", "KeyB", 0.0).is_backspace());
    }

    #[test]
    fn test_sensor_event_json_shape() {
        let line = r#"{"kind":"key","key":"a","code":"KeyA","timestamp":5.0,"direction":"down"}"#;
        let event: SensorEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event, SensorEvent::Key(KeyEvent::down("a", "KeyA", 5.0)));

        let line = r#"{"kind":"mouse","x":1.0,"y":2.0,"timestamp":3.0}"#;
        let event: SensorEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.timestamp(), 3.0);
    }
}
