//! Deterministic scripted event source.
//!
//! Replays a fixed sequence of events on `start`. Used to drive the core
//! without any input device.

use crate::collector::source::{CollectorError, EventSource, SOURCE_CHANNEL_CAPACITY};
use crate::collector::types::{KeyEvent, MouseEventData, SensorEvent};
use crossbeam_channel::{bounded, Receiver, Sender};

/// A source that emits a pre-recorded script.
pub struct SyntheticSource {
    script: Vec<SensorEvent>,
    sender: Sender<SensorEvent>,
    receiver: Receiver<SensorEvent>,
    active: bool,
    replayed: bool,
}

impl SyntheticSource {
    pub fn new(script: Vec<SensorEvent>) -> Self {
        let (sender, receiver) = bounded(SOURCE_CHANNEL_CAPACITY.max(script.len()));
        Self {
            script,
            sender,
            receiver,
            active: false,
            replayed: false,
        }
    }

    /// Build a script that types `text` with fixed dwell and flight times.
    ///
    /// Fixed timing produces zero rhythm variance, which is what an
    /// injection bot looks like.
    pub fn typing(text: &str, start_ms: f64, dwell_ms: f64, flight_ms: f64) -> Self {
        let mut script = Vec::with_capacity(text.len() * 2);
        let mut t = start_ms;
        for ch in text.chars() {
            let key = ch.to_string();
            let code = code_for_char(ch);
            script.push(SensorEvent::Key(KeyEvent::down(key.clone(), code.clone(), t)));
            t += dwell_ms;
            script.push(SensorEvent::Key(KeyEvent::up(key, code, t)));
            t += flight_ms;
        }
        Self::new(script)
    }

    /// Build a script of pointer samples along a straight line.
    pub fn linear_sweep(from: (f64, f64), to: (f64, f64), samples: usize, interval_ms: f64) -> Self {
        let steps = samples.max(2) - 1;
        let script = (0..=steps)
            .map(|i| {
                let f = i as f64 / steps as f64;
                SensorEvent::Mouse(MouseEventData::new(
                    from.0 + (to.0 - from.0) * f,
                    from.1 + (to.1 - from.1) * f,
                    i as f64 * interval_ms,
                ))
            })
            .collect();
        Self::new(script)
    }
}

fn code_for_char(ch: char) -> String {
    match ch {
        ' ' => "Space".to_string(),
        '\u{8}' => "Backspace".to_string(),
        c if c.is_ascii_digit() => format!("Digit{c}"),
        c if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
        c => format!("Unidentified{}", c as u32),
    }
}

impl EventSource for SyntheticSource {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.active {
            return Err(CollectorError::AlreadyRunning);
        }
        if self.replayed {
            return Err(CollectorError::Exhausted);
        }
        self.active = true;
        self.replayed = true;
        for event in self.script.drain(..) {
            // Capacity covers the whole script
            let _ = self.sender.try_send(event);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn receiver(&self) -> &Receiver<SensorEvent> {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_script_in_order() {
        let mut source = SyntheticSource::typing("ab", 0.0, 80.0, 70.0);
        assert!(!source.is_active());
        source.start().unwrap();
        assert!(source.is_active());

        let events: Vec<SensorEvent> = std::iter::from_fn(|| source.try_recv()).collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], SensorEvent::Key(KeyEvent::down("a", "KeyA", 0.0)));
        assert_eq!(events[1], SensorEvent::Key(KeyEvent::up("a", "KeyA", 80.0)));
        assert_eq!(events[2], SensorEvent::Key(KeyEvent::down("b", "KeyB", 150.0)));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut source = SyntheticSource::new(Vec::new());
        source.start().unwrap();
        assert!(matches!(source.start(), Err(CollectorError::AlreadyRunning)));
        source.stop();
        assert!(matches!(source.start(), Err(CollectorError::Exhausted)));
    }

    #[test]
    fn test_linear_sweep_endpoints() {
        let mut source = SyntheticSource::linear_sweep((0.0, 0.0), (100.0, 0.0), 5, 10.0);
        source.start().unwrap();
        let events: Vec<SensorEvent> = std::iter::from_fn(|| source.try_recv()).collect();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[4],
            SensorEvent::Mouse(MouseEventData::new(100.0, 0.0, 40.0))
        );
    }
}
