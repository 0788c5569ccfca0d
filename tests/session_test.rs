//! End-to-end monitoring session against an in-process analyzer.

use sentinel_sensor::analyzer::{AnalyzerEngine, TrustLedger};
use sentinel_sensor::collector::{EventSource, SyntheticSource};
use sentinel_sensor::config::AnalyzerSettings;
use sentinel_sensor::session::{MonitorSession, SessionSettings};
use sentinel_sensor::store::ProfileStore;
use sentinel_sensor::transparency::create_shared_log;
use sentinel_sensor::transport::{
    Channel, ChannelEvent, ConnectionStatus, ManualClock, TransportError, TransportNotice,
};
use sentinel_sensor::{FocusLevel, KeyEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers every sent line with the analyzer's reply.
struct LoopbackChannel {
    engine: AnalyzerEngine,
    ledger: TrustLedger,
    inbound: VecDeque<String>,
    open: bool,
    refuse_next: Arc<Mutex<u32>>,
}

impl LoopbackChannel {
    fn new() -> Self {
        let engine = AnalyzerEngine::new(AnalyzerSettings::default());
        let ledger = TrustLedger::new(engine.settings());
        Self {
            engine,
            ledger,
            inbound: VecDeque::new(),
            open: false,
            refuse_next: Arc::new(Mutex::new(0)),
        }
    }
}

impl Channel for LoopbackChannel {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut refuse = self.refuse_next.lock().unwrap();
        if *refuse > 0 {
            *refuse -= 1;
            return Err(TransportError::Connect("refused".to_string()));
        }
        self.open = true;
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Send("not open".to_string()));
        }
        let reply = self.engine.respond(text, &mut self.ledger);
        self.inbound
            .push_back(serde_json::to_string(&reply).unwrap());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.inbound.pop_front().map(ChannelEvent::Message)
    }

    fn close(&mut self) {
        self.open = false;
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        mouse_sample_interval_ms: 0,
        opaque_storage: true,
        ..SessionSettings::default()
    }
}

fn drain(source: &mut SyntheticSource, session: &mut MonitorSession<LoopbackChannel, ManualClock>) {
    source.start().unwrap();
    while let Some(event) = source.try_recv() {
        session.record(event);
    }
}

#[test]
fn test_scripted_bot_typing_loses_trust() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let mut session = MonitorSession::new(
        settings(),
        LoopbackChannel::new(),
        clock.clone(),
        ProfileStore::open(dir.path()),
        create_shared_log(None),
    );
    session.start();
    assert_eq!(session.status(), ConnectionStatus::Open);

    // Fixed dwell and flight: zero rhythm variance
    let mut source = SyntheticSource::typing("automated", 0.0, 50.0, 100.0);
    drain(&mut source, &mut session);

    clock.advance(1000);
    session.tick();
    let verdicts = session.tick();
    assert_eq!(verdicts.len(), 1);
    assert!(verdicts[0].bot_detected);
    assert_eq!(session.trust().score, 50);
    assert_eq!(session.trust().bot_verdicts, 1);

    let logs = session.store().read_logs(true);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].encrypted);
    assert_eq!(logs[0].trust_score, 50);

    // Stored opaque, so a plain read must fall back
    assert_eq!(session.store().read_logs(false).len(), 1);

    let profile = session.stop().unwrap();
    assert_eq!(profile.total_sessions, 1);
    assert_eq!(profile.avg_flight_time, 100.0);
}

#[test]
fn test_human_typing_keeps_trust_and_focus() {
    let clock = ManualClock::new(0);
    let mut session = MonitorSession::new(
        settings(),
        LoopbackChannel::new(),
        clock.clone(),
        ProfileStore::in_memory(),
        create_shared_log(None),
    );
    session.start();

    let script = [
        (0.0, 92.0),
        (205.0, 290.0),
        (380.0, 478.0),
        (620.0, 705.0),
        (830.0, 921.0),
    ];
    for (i, (down, up)) in script.iter().enumerate() {
        let code = format!("Key{}", (b'A' + i as u8) as char);
        session.record(KeyEvent::down("x", code.clone(), *down).into());
        session.record(KeyEvent::up("x", code, *up).into());
    }

    clock.advance(1000);
    session.tick();
    session.tick();

    let verdict = session.last_verdict().expect("no verdict");
    assert!(!verdict.bot_detected);
    assert_eq!(verdict.focus_level, FocusLevel::High);
    assert_eq!(session.trust().score, 81);
    assert_eq!(session.refresh_metrics().total_keys, 5);
}

#[test]
fn test_payloads_queue_until_reconnect() {
    let clock = ManualClock::new(0);
    let channel = LoopbackChannel::new();
    *channel.refuse_next.lock().unwrap() = 1;

    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = notices.clone();

    let settings = SessionSettings {
        upload_interval_ms: 500,
        ..settings()
    };
    let mut session = MonitorSession::new(
        settings,
        channel,
        clock.clone(),
        ProfileStore::in_memory(),
        create_shared_log(None),
    );
    session.on_notice(move |n| sink.lock().unwrap().push(n.clone()));
    session.start();
    assert_eq!(session.status(), ConnectionStatus::Error);

    session.record(KeyEvent::down("a", "KeyA", 0.0).into());
    session.record(KeyEvent::up("a", "KeyA", 80.0).into());

    // Upload fires before the earliest reconnect at 1000 ms
    clock.advance(500);
    session.tick();
    assert_eq!(session.transport().queued_len(), 1);
    assert!(session.last_verdict().is_none());

    clock.advance(800);
    session.tick();
    session.tick();
    assert_eq!(session.status(), ConnectionStatus::Open);
    assert_eq!(session.transport().queued_len(), 0);
    assert!(session.last_verdict().is_some());
    assert_eq!(session.transparency().stats().transport_errors, 1);

    let statuses: Vec<ConnectionStatus> = notices
        .lock()
        .unwrap()
        .iter()
        .filter_map(|n| match n {
            TransportNotice::Status(s) => Some(*s),
            TransportNotice::Error(_) => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
            ConnectionStatus::Connecting,
            ConnectionStatus::Open
        ]
    );
}

#[test]
fn test_short_input_is_scored_on_drain() {
    let clock = ManualClock::new(0);
    let transparency = create_shared_log(None);
    let mut session = MonitorSession::new(
        settings(),
        LoopbackChannel::new(),
        clock.clone(),
        ProfileStore::in_memory(),
        transparency.clone(),
    );
    session.start();

    // Input ends well before the first upload period
    let mut source = SyntheticSource::typing("ok", 0.0, 50.0, 100.0);
    drain(&mut source, &mut session);
    session.tick();
    assert!(session.last_verdict().is_none());

    let ticker = clock.clone();
    let verdicts = session.drain(3000, move || ticker.advance(20));
    assert_eq!(verdicts.len(), 1);
    assert_eq!(transparency.stats().payloads_sent, 1);
    assert_eq!(transparency.stats().verdicts_received, 1);
    assert_eq!(session.store().read_logs(true).len(), 1);

    let profile = session.stop().unwrap();
    assert_eq!(profile.total_sessions, 1);
    assert_eq!(session.stop().unwrap().total_sessions, 1);
}
