//! Feature computation from raw event buffers.
//!
//! Both entry points are pure: identical input and privacy flag always give
//! identical output, and every input shape (including empty) has a defined
//! zero-valued result.

use crate::collector::types::{KeyEvent, MouseEventData};
use crate::core::privacy::key_identifier;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

/// Flight gaps at or above this are pauses, not rhythm (milliseconds).
pub const PAUSE_THRESHOLD_MS: f64 = 2000.0;

/// Minimum angular change counted as a tremor (radians).
pub const TREMOR_ANGLE_THRESHOLD: f64 = 0.1;

/// Maximum segment length counted as a tremor (pixels).
pub const TREMOR_DISTANCE_THRESHOLD: f64 = 5.0;

/// Average characters per word used for WPM.
const CHARS_PER_WORD: f64 = 5.0;

/// Per-key aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    /// Raw code without the "Key" prefix, or a pseudonym in privacy mode
    pub key: String,
    /// Number of presses
    pub count: u32,
    /// Mean hold duration in milliseconds (0 when no press was released)
    pub avg_dwell_time: f64,
    /// Corrections attributed to this key
    pub error_count: u32,
}

/// Session-wide pointer aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseMetrics {
    /// Pixels per millisecond
    pub avg_velocity: f64,
    /// Pixels per millisecond
    pub max_velocity: f64,
    /// Radians per millisecond
    pub avg_angular_velocity: f64,
    /// Sharp direction changes over very short segments
    pub tremor_count: u32,
}

/// Full-session feature snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Timestamp of the first key event (milliseconds)
    pub start_time: f64,
    /// Timestamp of the last key event (milliseconds)
    pub end_time: f64,
    /// Number of key presses
    pub total_keys: u32,
    /// Words per minute, five characters per word
    pub wpm: f64,
    /// Characters per minute
    pub cpm: f64,
    /// Percentage in 0..=100
    pub accuracy: f64,
    /// Mean hold duration over released presses (milliseconds)
    pub avg_dwell_time: f64,
    /// Mean release-to-press gap below the pause threshold (milliseconds)
    pub avg_flight_time: f64,
    /// Number of backspace presses
    pub backspace_count: u32,
    /// Population standard deviation of flight times (milliseconds)
    pub rhythm_variance: f64,
    /// Number of flight samples behind the flight statistics
    pub flight_sample_count: u32,
    /// Key presses the source flagged as injected
    pub synthetic_key_count: u32,
    /// All keys, most pressed first
    pub top_keys: Vec<KeyMetrics>,
    /// Pointer aggregate over the same capture
    pub mouse: MouseMetrics,
    /// Whether key identities were pseudonymised
    pub privacy_mode: bool,
}

impl SessionMetrics {
    /// Metrics for a session with no key input.
    pub fn empty(mouse: MouseMetrics, privacy_mode: bool) -> Self {
        Self {
            start_time: 0.0,
            end_time: 0.0,
            total_keys: 0,
            wpm: 0.0,
            cpm: 0.0,
            accuracy: 100.0,
            avg_dwell_time: 0.0,
            avg_flight_time: 0.0,
            backspace_count: 0,
            rhythm_variance: 0.0,
            flight_sample_count: 0,
            synthetic_key_count: 0,
            top_keys: Vec::new(),
            mouse,
            privacy_mode,
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::empty(MouseMetrics::default(), false)
    }
}

/// Compute pointer ballistics from consecutive samples.
pub fn compute_mouse_metrics(samples: &[MouseEventData]) -> MouseMetrics {
    if samples.len() < 2 {
        return MouseMetrics::default();
    }

    let mut total_distance = 0.0;
    let mut total_time = 0.0;
    let mut total_angle_change = 0.0;
    let mut max_velocity: f64 = 0.0;
    let mut tremor_count = 0;
    let mut prev_angle: Option<f64> = None;

    for pair in samples.windows(2) {
        let dt = pair[1].timestamp - pair[0].timestamp;
        if dt <= 0.0 {
            continue;
        }

        let dx = pair[1].x - pair[0].x;
        let dy = pair[1].y - pair[0].y;
        let distance = dx.hypot(dy);

        total_distance += distance;
        total_time += dt;
        max_velocity = max_velocity.max(distance / dt);

        let angle = dy.atan2(dx);
        if let Some(prev) = prev_angle {
            let change = (angle - prev).abs();
            total_angle_change += change;
            // Sharp turns over tiny distances are hand jitter
            if change > TREMOR_ANGLE_THRESHOLD && distance < TREMOR_DISTANCE_THRESHOLD {
                tremor_count += 1;
            }
        }
        prev_angle = Some(angle);
    }

    if total_time <= 0.0 {
        return MouseMetrics::default();
    }

    MouseMetrics {
        avg_velocity: total_distance / total_time,
        max_velocity,
        avg_angular_velocity: total_angle_change / total_time,
        tremor_count,
    }
}

#[derive(Default)]
struct KeyAccumulator {
    count: u32,
    dwell_times: Vec<f64>,
    error_count: u32,
}

/// Compute keystroke dynamics and pointer ballistics for a session.
pub fn compute_session_metrics(
    key_events: &[KeyEvent],
    mouse_events: &[MouseEventData],
    privacy_mode: bool,
) -> SessionMetrics {
    let mouse = compute_mouse_metrics(mouse_events);

    let (first, last) = match (key_events.first(), key_events.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return SessionMetrics::empty(mouse, privacy_mode),
    };

    // Keyed by physical code; identifiers are derived once at the end
    let mut per_key: BTreeMap<&str, KeyAccumulator> = BTreeMap::new();
    let mut pending_down: HashMap<&str, f64> = HashMap::new();
    let mut flight_times: Vec<f64> = Vec::new();
    let mut last_up: Option<f64> = None;
    let mut total_keys: u32 = 0;
    let mut backspace_count: u32 = 0;
    let mut synthetic_key_count: u32 = 0;

    for event in key_events {
        let code = event.code.as_str();
        if event.is_down() {
            total_keys += 1;
            if event.synthetic {
                synthetic_key_count += 1;
            }

            let entry = per_key.entry(code).or_default();
            entry.count += 1;
            if event.is_backspace() {
                backspace_count += 1;
                entry.error_count += 1;
            }

            // Auto-repeat keeps the first press as the hold start
            pending_down.entry(code).or_insert(event.timestamp);

            if let Some(up) = last_up {
                let flight = event.timestamp - up;
                if flight < PAUSE_THRESHOLD_MS {
                    flight_times.push(flight);
                }
            }
        } else {
            if let Some(down) = pending_down.remove(code) {
                per_key
                    .entry(code)
                    .or_default()
                    .dwell_times
                    .push(event.timestamp - down);
            }
            last_up = Some(event.timestamp);
        }
    }

    let mut top_keys: Vec<KeyMetrics> = per_key
        .into_iter()
        .map(|(code, acc)| KeyMetrics {
            key: key_identifier(code, privacy_mode),
            count: acc.count,
            avg_dwell_time: if acc.dwell_times.is_empty() {
                0.0
            } else {
                acc.dwell_times.iter().mean()
            },
            error_count: acc.error_count,
        })
        .collect();
    top_keys.sort_by(|a, b| b.count.cmp(&a.count));

    let dwell_means: Vec<f64> = top_keys
        .iter()
        .map(|k| k.avg_dwell_time)
        .filter(|&d| d > 0.0)
        .collect();
    let avg_dwell_time = if dwell_means.is_empty() {
        0.0
    } else {
        dwell_means.iter().mean()
    };

    let (avg_flight_time, rhythm_variance) = if flight_times.is_empty() {
        (0.0, 0.0)
    } else {
        (
            flight_times.iter().mean(),
            flight_times.iter().population_std_dev(),
        )
    };

    let duration_minutes = (last - first) / 60_000.0;
    let cpm = if duration_minutes > 0.0 {
        total_keys as f64 / duration_minutes
    } else {
        0.0
    };

    let accuracy = if total_keys == 0 {
        100.0
    } else {
        (100.0 - 100.0 * backspace_count as f64 / total_keys as f64).max(0.0)
    };

    SessionMetrics {
        start_time: first,
        end_time: last,
        total_keys,
        wpm: cpm / CHARS_PER_WORD,
        cpm,
        accuracy,
        avg_dwell_time,
        avg_flight_time,
        backspace_count,
        rhythm_variance,
        flight_sample_count: flight_times.len() as u32,
        synthetic_key_count,
        top_keys,
        mouse,
        privacy_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(code: &str, t: f64) -> KeyEvent {
        KeyEvent::down(code.trim_start_matches("Key"), code, t)
    }

    fn up(code: &str, t: f64) -> KeyEvent {
        KeyEvent::up(code.trim_start_matches("Key"), code, t)
    }

    fn key(metrics: &SessionMetrics, id: &str) -> KeyMetrics {
        metrics
            .top_keys
            .iter()
            .find(|k| k.key == id)
            .cloned()
            .unwrap_or_else(|| panic!("missing key {id}"))
    }

    #[test]
    fn test_empty_keys() {
        let metrics = compute_session_metrics(&[], &[], false);
        assert_eq!(metrics.total_keys, 0);
        assert_eq!(metrics.accuracy, 100.0);
        assert_eq!(metrics.wpm, 0.0);
        assert_eq!(metrics.rhythm_variance, 0.0);
        assert!(metrics.top_keys.is_empty());
    }

    #[test]
    fn test_empty_keys_keeps_mouse_metrics() {
        let mouse = [
            MouseEventData::new(0.0, 0.0, 0.0),
            MouseEventData::new(3.0, 4.0, 10.0),
        ];
        let metrics = compute_session_metrics(&[], &mouse, true);
        assert_eq!(metrics.total_keys, 0);
        assert!(metrics.privacy_mode);
        assert!((metrics.mouse.avg_velocity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_key_scenario() {
        let events = vec![
            down("KeyA", 0.0),
            up("KeyA", 80.0),
            down("KeyB", 150.0),
            up("KeyB", 210.0),
        ];
        let metrics = compute_session_metrics(&events, &[], false);

        assert_eq!(key(&metrics, "A").avg_dwell_time, 80.0);
        assert_eq!(key(&metrics, "B").avg_dwell_time, 60.0);
        assert_eq!(metrics.avg_flight_time, 70.0);
        assert_eq!(metrics.flight_sample_count, 1);
        assert_eq!(metrics.total_keys, 2);
        assert_eq!(metrics.rhythm_variance, 0.0);
        assert_eq!(metrics.accuracy, 100.0);
        assert_eq!(metrics.avg_dwell_time, 70.0);
        assert_eq!(metrics.start_time, 0.0);
        assert_eq!(metrics.end_time, 210.0);
    }

    #[test]
    fn test_flight_pause_boundary() {
        let included = vec![down("KeyA", 0.0), up("KeyA", 50.0), down("KeyB", 2049.0)];
        let metrics = compute_session_metrics(&included, &[], false);
        assert_eq!(metrics.flight_sample_count, 1);
        assert_eq!(metrics.avg_flight_time, 1999.0);

        let excluded = vec![down("KeyA", 0.0), up("KeyA", 50.0), down("KeyB", 2050.0)];
        let metrics = compute_session_metrics(&excluded, &[], false);
        assert_eq!(metrics.flight_sample_count, 0);
        assert_eq!(metrics.avg_flight_time, 0.0);
        assert_eq!(metrics.rhythm_variance, 0.0);
    }

    #[test]
    fn test_rhythm_variance_is_population_std_dev() {
        // Flights: 100, 200, 300
        let events = vec![
            down("KeyA", 0.0),
            up("KeyA", 50.0),
            down("KeyB", 150.0),
            up("KeyB", 200.0),
            down("KeyC", 400.0),
            up("KeyC", 450.0),
            down("KeyD", 750.0),
        ];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.flight_sample_count, 3);
        assert!((metrics.avg_flight_time - 200.0).abs() < 1e-9);
        let expected = (20_000.0_f64 / 3.0).sqrt();
        assert!((metrics.rhythm_variance - expected).abs() < 1e-9);
    }

    #[test]
    fn test_backspace_counts_errors() {
        let events = vec![
            down("KeyA", 0.0),
            up("KeyA", 50.0),
            down("Backspace", 100.0),
            up("Backspace", 150.0),
            down("KeyA", 200.0),
            up("KeyA", 250.0),
            down("KeyB", 300.0),
            up("KeyB", 350.0),
        ];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.total_keys, 4);
        assert_eq!(metrics.backspace_count, 1);
        assert_eq!(metrics.accuracy, 75.0);
        assert_eq!(key(&metrics, "Backspace").error_count, 1);
        assert_eq!(metrics.top_keys[0].key, "A");
        assert_eq!(metrics.top_keys[0].count, 2);
    }

    #[test]
    fn test_accuracy_never_negative() {
        let events = vec![down("Backspace", 0.0), down("Backspace", 10.0)];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn test_unmatched_up_is_ignored() {
        let events = vec![up("KeyA", 0.0), down("KeyB", 10.0), up("KeyB", 30.0)];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.total_keys, 1);
        // The stray release still marks the end of the previous keystroke
        assert_eq!(metrics.avg_flight_time, 10.0);
        assert_eq!(key(&metrics, "B").avg_dwell_time, 20.0);
        assert!(metrics.top_keys.iter().all(|k| k.key != "A"));
    }

    #[test]
    fn test_unreleased_key_excluded_from_dwell_mean() {
        let events = vec![down("KeyA", 0.0), up("KeyA", 100.0), down("KeyB", 150.0)];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(key(&metrics, "B").avg_dwell_time, 0.0);
        assert_eq!(metrics.avg_dwell_time, 100.0);
    }

    #[test]
    fn test_wpm_and_cpm() {
        // 10 presses across one minute
        let mut events = Vec::new();
        for i in 0..10 {
            let t = i as f64 * 6_000.0;
            events.push(down("KeyA", t));
            events.push(up("KeyA", t + 100.0));
        }
        let last = events.last().unwrap().timestamp;
        let metrics = compute_session_metrics(&events, &[], false);
        let minutes = last / 60_000.0;
        assert!((metrics.cpm - 10.0 / minutes).abs() < 1e-9);
        assert!((metrics.wpm - metrics.cpm / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_has_zero_rate() {
        let events = vec![down("KeyA", 5.0)];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.cpm, 0.0);
        assert_eq!(metrics.wpm, 0.0);
    }

    #[test]
    fn test_privacy_mode_hashes_identifiers() {
        let events = vec![down("KeyA", 0.0), up("KeyA", 80.0)];
        let metrics = compute_session_metrics(&events, &[], true);
        assert!(metrics.privacy_mode);
        assert_eq!(
            metrics.top_keys[0].key,
            crate::core::privacy::hash_key_code("KeyA")
        );
    }

    #[test]
    fn test_synthetic_keys_counted() {
        let events = vec![
            down("KeyA", 0.0).synthetic(),
            up("KeyA", 10.0).synthetic(),
            down("KeyB", 20.0),
        ];
        let metrics = compute_session_metrics(&events, &[], false);
        assert_eq!(metrics.synthetic_key_count, 1);
    }

    #[test]
    fn test_mouse_requires_two_samples() {
        assert_eq!(compute_mouse_metrics(&[]), MouseMetrics::default());
        assert_eq!(
            compute_mouse_metrics(&[MouseEventData::new(1.0, 1.0, 1.0)]),
            MouseMetrics::default()
        );
    }

    #[test]
    fn test_mouse_single_segment() {
        let metrics = compute_mouse_metrics(&[
            MouseEventData::new(0.0, 0.0, 0.0),
            MouseEventData::new(3.0, 4.0, 10.0),
        ]);
        assert!((metrics.avg_velocity - 0.5).abs() < 1e-12);
        assert!((metrics.max_velocity - 0.5).abs() < 1e-12);
        assert_eq!(metrics.avg_angular_velocity, 0.0);
        assert_eq!(metrics.tremor_count, 0);
    }

    #[test]
    fn test_mouse_skips_zero_elapsed_pairs() {
        let metrics = compute_mouse_metrics(&[
            MouseEventData::new(0.0, 0.0, 0.0),
            MouseEventData::new(100.0, 0.0, 0.0),
            MouseEventData::new(110.0, 0.0, 10.0),
        ]);
        assert!((metrics.avg_velocity - 1.0).abs() < 1e-12);
        assert_eq!(metrics.avg_angular_velocity, 0.0);
    }

    #[test]
    fn test_tremor_detection() {
        // Small zig-zag: every turn after the first segment is sharp and short
        let samples = vec![
            MouseEventData::new(0.0, 0.0, 0.0),
            MouseEventData::new(2.0, 0.0, 10.0),
            MouseEventData::new(2.0, 2.0, 20.0),
            MouseEventData::new(4.0, 2.0, 30.0),
        ];
        let metrics = compute_mouse_metrics(&samples);
        assert_eq!(metrics.tremor_count, 2);
        let expected = std::f64::consts::PI / 30.0;
        assert!((metrics.avg_angular_velocity - expected).abs() < 1e-12);
    }

    #[test]
    fn test_long_straight_sweep_has_no_tremor() {
        let samples: Vec<MouseEventData> = (0..20)
            .map(|i| MouseEventData::new(i as f64 * 40.0, i as f64 * 10.0, i as f64 * 8.0))
            .collect();
        let metrics = compute_mouse_metrics(&samples);
        assert_eq!(metrics.tremor_count, 0);
        assert!(metrics.avg_angular_velocity.abs() < 1e-12);
    }
}
