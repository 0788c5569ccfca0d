//! Live raw-event buffers for a monitoring session.
//!
//! `EventCapture` is the only writer of the key and pointer buffers. Events are
//! appended in arrival order and never reordered; the oldest events are
//! evicted once a buffer reaches its capacity.

use crate::collector::types::{KeyEvent, MouseEventData, SensorEvent};
use std::collections::VecDeque;

/// Bounded key and pointer buffers.
#[derive(Debug, Clone)]
pub struct EventCapture {
    keys: VecDeque<KeyEvent>,
    mouse: VecDeque<MouseEventData>,
    capacity: usize,
    mouse_sample_interval_ms: f64,
    last_mouse_timestamp: Option<f64>,
}

impl EventCapture {
    /// Create buffers holding at most `capacity` events each.
    ///
    /// Pointer samples closer than `mouse_sample_interval_ms` to the last
    /// accepted sample are dropped; 0 keeps every sample.
    pub fn new(capacity: usize, mouse_sample_interval_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            keys: VecDeque::with_capacity(capacity.min(1024)),
            mouse: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            mouse_sample_interval_ms: mouse_sample_interval_ms as f64,
            last_mouse_timestamp: None,
        }
    }

    /// Append an event. Returns `true` when a buffer changed.
    pub fn push(&mut self, event: SensorEvent) -> bool {
        match event {
            SensorEvent::Key(e) => {
                if self.keys.len() == self.capacity {
                    self.keys.pop_front();
                }
                self.keys.push_back(e);
                true
            }
            SensorEvent::Mouse(e) => {
                if let Some(last) = self.last_mouse_timestamp {
                    if e.timestamp - last < self.mouse_sample_interval_ms {
                        return false;
                    }
                }
                if self.mouse.len() == self.capacity {
                    self.mouse.pop_front();
                }
                self.last_mouse_timestamp = Some(e.timestamp);
                self.mouse.push_back(e);
                true
            }
        }
    }

    /// Contiguous read-only views of both buffers.
    pub fn snapshot(&mut self) -> (&[KeyEvent], &[MouseEventData]) {
        let keys: &[KeyEvent] = self.keys.make_contiguous();
        let mouse: &[MouseEventData] = self.mouse.make_contiguous();
        (keys, mouse)
    }

    /// The most recent `n` key events, oldest first.
    pub fn recent_keys(&self, n: usize) -> impl Iterator<Item = &KeyEvent> {
        self.keys.iter().skip(self.keys.len().saturating_sub(n))
    }

    /// The most recent `n` pointer samples, oldest first.
    pub fn recent_mouse(&self, n: usize) -> impl Iterator<Item = &MouseEventData> {
        self.mouse.iter().skip(self.mouse.len().saturating_sub(n))
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn mouse_count(&self) -> usize {
        self.mouse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.mouse.is_empty()
    }

    /// Drop all buffered events.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.mouse.clear();
        self.last_mouse_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut capture = EventCapture::new(3, 0);
        for i in 0..5 {
            capture.push(KeyEvent::down("a", "KeyA", i as f64).into());
        }
        let (keys, _) = capture.snapshot();
        let timestamps: Vec<f64> = keys.iter().map(|k| k.timestamp).collect();
        assert_eq!(timestamps, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mouse_rate_limit() {
        let mut capture = EventCapture::new(100, 16);
        assert!(capture.push(MouseEventData::new(0.0, 0.0, 0.0).into()));
        assert!(!capture.push(MouseEventData::new(1.0, 0.0, 10.0).into()));
        assert!(capture.push(MouseEventData::new(2.0, 0.0, 16.0).into()));
        assert_eq!(capture.mouse_count(), 2);
    }

    #[test]
    fn test_recent_slices_keep_order() {
        let mut capture = EventCapture::new(100, 0);
        for i in 0..10 {
            capture.push(MouseEventData::new(i as f64, 0.0, i as f64).into());
        }
        let recent: Vec<f64> = capture.recent_mouse(3).map(|m| m.x).collect();
        assert_eq!(recent, vec![7.0, 8.0, 9.0]);
        assert_eq!(capture.recent_keys(3).count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut capture = EventCapture::new(10, 0);
        capture.push(KeyEvent::down("a", "KeyA", 0.0).into());
        assert!(!capture.is_empty());
        capture.clear();
        assert!(capture.is_empty());
    }
}
