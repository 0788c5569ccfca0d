//! Demonstration of feature extraction and analyzer scoring on scripted input.
//!
//! This example shows how to:
//! 1. Replay scripted key and pointer events through an event source
//! 2. Buffer them with EventCapture
//! 3. Compute session metrics
//! 4. Build the outbound payload and score it with the reference analyzer
//!
//! Run with: cargo run --example replay_demo

use sentinel_sensor::{
    analyzer::{AnalyzerEngine, TrustLedger},
    collector::{EventCapture, EventSource, KeyEvent, SensorEvent, SyntheticSource},
    compute_session_metrics,
    config::AnalyzerSettings,
    transport::StreamPayload,
};

fn human_script() -> SyntheticSource {
    // Irregular dwell and flight, the way people type
    let timings = [
        ('h', 0.0, 96.0),
        ('e', 214.0, 301.0),
        ('l', 377.0, 462.0),
        ('l', 598.0, 688.0),
        ('o', 801.0, 879.0),
    ];
    let mut script: Vec<SensorEvent> = Vec::new();
    for (ch, down, up) in timings {
        let code = format!("Key{}", ch.to_ascii_uppercase());
        script.push(KeyEvent::down(ch.to_string(), code.clone(), down).into());
        script.push(KeyEvent::up(ch.to_string(), code, up).into());
    }
    SyntheticSource::new(script)
}

fn replay(name: &str, mut source: SyntheticSource, engine: &AnalyzerEngine) {
    println!("{name}");
    println!("{}", "-".repeat(name.len()));

    let mut capture = EventCapture::new(10_000, 0);
    if let Err(e) = source.start() {
        eprintln!("Could not start source: {e}");
        return;
    }
    while let Some(event) = source.try_recv() {
        capture.push(event);
    }

    let (keys, mouse) = capture.snapshot();
    let metrics = compute_session_metrics(keys, mouse, false);
    println!(
        "  Keys: {} | WPM: {:.0} | Flight: {:.1}ms | Dwell: {:.1}ms | Rhythm σ: {:.1}ms",
        metrics.total_keys,
        metrics.wpm,
        metrics.avg_flight_time,
        metrics.avg_dwell_time,
        metrics.rhythm_variance
    );
    println!(
        "  Pointer: {:.3}px/ms avg, {:.5}rad/ms angular",
        metrics.mouse.avg_velocity, metrics.mouse.avg_angular_velocity
    );

    let payload = StreamPayload::from_recent(
        capture.recent_keys(200),
        capture.recent_mouse(200),
        false,
    );
    let mut ledger = TrustLedger::new(engine.settings());
    let assessment = engine.analyze(&payload, &mut ledger);
    let verdict = &assessment.response;
    println!(
        "  Verdict: {} | focus: {} | risk: {:.0} | trust: {} ({:+})",
        verdict.current_activity,
        verdict.focus_level,
        verdict.risk_score,
        verdict.trust_score,
        verdict.trust_delta
    );
    println!("  {}", verdict.summary);
    println!();
}

fn main() {
    println!("Sentinel Sensor - Replay Demo");
    println!("=============================");
    println!();

    let engine = AnalyzerEngine::new(AnalyzerSettings::default());

    replay("Human typing", human_script(), &engine);
    replay(
        "Scripted typing",
        SyntheticSource::typing("password123", 0.0, 40.0, 80.0),
        &engine,
    );
    replay(
        "Scripted pointer sweep",
        SyntheticSource::linear_sweep((0.0, 0.0), (1600.0, 900.0), 60, 16.0),
        &engine,
    );
}
