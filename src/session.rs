//! A monitoring session: capture, features, streaming and persistence.
//!
//! `MonitorSession` is driven from a single thread. Events go in through
//! [`record`](MonitorSession::record); [`tick`](MonitorSession::tick) is
//! called regularly to exchange messages with the analyzer and fire the
//! periodic upload.

use crate::collector::{EventCapture, SensorEvent};
use crate::config::Config;
use crate::core::{
    compute_session_metrics, AnalysisResponse, MouseMetrics, SessionMetrics, TrustState,
};
use crate::media::{FrameRelay, FrameSink, FrameSource};
use crate::store::{ActivityLog, ProfileStore, StoreError, UserProfile};
use crate::transparency::SharedTransparencyLog;
use crate::transport::{
    BackoffConfig, Channel, Clock, ConnectionStatus, PeriodicTask, StreamPayload, StreamTransport,
    SystemClock, TransportNotice, UsbEvent,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-session knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub upload_interval_ms: u64,
    pub recent_event_limit: usize,
    pub buffer_capacity: usize,
    pub mouse_sample_interval_ms: u64,
    pub privacy_mode: bool,
    pub opaque_storage: bool,
    pub reconnect: BackoffConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_interval_ms: config.upload_interval.as_millis() as u64,
            recent_event_limit: config.recent_event_limit,
            buffer_capacity: config.buffer_capacity,
            mouse_sample_interval_ms: config.mouse_sample_interval_ms,
            privacy_mode: config.privacy_mode,
            opaque_storage: config.opaque_storage,
            reconnect: config.reconnect,
        }
    }
}

pub struct MonitorSession<C: Channel, K: Clock + Clone = SystemClock> {
    id: Uuid,
    settings: SessionSettings,
    capture: EventCapture,
    metrics: SessionMetrics,
    metrics_stale: bool,
    /// Events recorded since the last payload went out
    unsent: bool,
    pending_usb: Option<UsbEvent>,
    transport: StreamTransport<C, K>,
    clock: K,
    store: ProfileStore,
    trust: TrustState,
    upload_task: Option<PeriodicTask>,
    frames: Option<FrameRelay>,
    transparency: SharedTransparencyLog,
    last_verdict: Option<AnalysisResponse>,
    started_at: Option<DateTime<Utc>>,
}

impl<C: Channel, K: Clock + Clone> MonitorSession<C, K> {
    pub fn new(
        settings: SessionSettings,
        channel: C,
        clock: K,
        store: ProfileStore,
        transparency: SharedTransparencyLog,
    ) -> Self {
        let transport = StreamTransport::new(channel, clock.clone(), settings.reconnect);
        let mut session = Self {
            id: Uuid::new_v4(),
            capture: EventCapture::new(settings.buffer_capacity, settings.mouse_sample_interval_ms),
            metrics: SessionMetrics::empty(MouseMetrics::default(), settings.privacy_mode),
            metrics_stale: false,
            unsent: false,
            pending_usb: None,
            transport,
            clock,
            store,
            trust: TrustState::default(),
            upload_task: None,
            frames: None,
            transparency,
            last_verdict: None,
            started_at: None,
            settings,
        };
        session.on_notice(|_| {});
        session
    }

    /// Observe transport status changes and errors.
    pub fn on_notice<F>(&mut self, mut observer: F)
    where
        F: FnMut(&TransportNotice) + Send + 'static,
    {
        let transparency = self.transparency.clone();
        self.transport.on_notice(move |notice| {
            if matches!(notice, TransportNotice::Error(_)) {
                transparency.record_transport_error();
            }
            observer(notice);
        });
    }

    /// Forward frames from `source` to `sink` every `interval_ms`.
    pub fn attach_frames(
        &mut self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        interval_ms: u64,
    ) {
        self.frames = Some(FrameRelay::new(
            source,
            sink,
            interval_ms,
            self.clock.now_ms(),
        ));
    }

    /// Connect to the analyzer and begin periodic uploads.
    pub fn start(&mut self) {
        if self.is_active() {
            return;
        }
        tracing::info!(session = %self.id, "monitoring started");
        self.started_at = Some(Utc::now());
        self.upload_task = Some(PeriodicTask::new(
            self.settings.upload_interval_ms,
            self.clock.now_ms(),
        ));
        self.transport.connect();
    }

    pub fn is_active(&self) -> bool {
        self.upload_task.is_some()
    }

    /// Append one raw event. Returns whether it was kept.
    pub fn record(&mut self, event: SensorEvent) -> bool {
        let is_key = matches!(event, SensorEvent::Key(_));
        if !self.capture.push(event) {
            return false;
        }
        if is_key {
            self.transparency.record_key_event();
        } else {
            self.transparency.record_mouse_event();
        }
        self.metrics_stale = true;
        self.unsent = true;
        true
    }

    /// Report a device attachment. It rides on the next payload.
    pub fn report_usb_event(&mut self, event: UsbEvent) {
        tracing::info!(suspicious = event.is_suspicious, "device event reported");
        self.pending_usb = Some(event);
    }

    /// Recompute features over the current buffers if anything changed.
    pub fn refresh_metrics(&mut self) -> &SessionMetrics {
        if self.metrics_stale {
            let privacy = self.settings.privacy_mode;
            let (keys, mouse) = self.capture.snapshot();
            self.metrics = compute_session_metrics(keys, mouse, privacy);
            self.metrics_stale = false;
        }
        &self.metrics
    }

    /// Exchange messages with the analyzer and run due periodic work.
    ///
    /// Returns the verdicts received during this tick.
    pub fn tick(&mut self) -> Vec<AnalysisResponse> {
        let verdicts = self.receive();
        self.refresh_metrics();

        let now = self.clock.now_ms();
        if self.upload_task.as_mut().is_some_and(|task| task.poll(now)) {
            self.send_recent();
        }
        if self.is_active() {
            if let Some(relay) = self.frames.as_mut() {
                relay.poll(now);
            }
        }

        verdicts
    }

    /// Send anything recorded since the last upload and wait for the
    /// analyzer to answer it.
    ///
    /// Returns once the outbound queue is empty and a verdict has arrived, or
    /// when `timeout_ms` has passed on the session clock. `wait` runs between
    /// polls.
    pub fn drain(&mut self, timeout_ms: u64, mut wait: impl FnMut()) -> Vec<AnalysisResponse> {
        let mut verdicts = Vec::new();
        if !self.is_active() {
            return verdicts;
        }

        let awaiting_reply = (self.unsent || self.pending_usb.is_some()) && self.send_recent();
        let deadline = self.clock.now_ms().saturating_add(timeout_ms);
        loop {
            verdicts.extend(self.receive());
            let settled =
                self.transport.queued_len() == 0 && (!awaiting_reply || !verdicts.is_empty());
            if settled || self.clock.now_ms() >= deadline {
                break;
            }
            wait();
        }

        if self.transport.queued_len() > 0 {
            tracing::warn!(
                queued = self.transport.queued_len(),
                "analyzer did not drain before timeout"
            );
        }
        verdicts
    }

    /// Disconnect and fold this session into the stored profile.
    ///
    /// Only the first call after [`start`](Self::start) counts the session;
    /// later calls return the stored profile unchanged.
    pub fn stop(&mut self) -> Result<UserProfile, StoreError> {
        if !self.is_active() {
            return Ok(self.store.read_profile());
        }
        self.transport.disconnect();
        self.upload_task = None;
        self.refresh_metrics();

        if let Err(e) = self.transparency.save() {
            tracing::warn!(error = %e, "could not persist transparency stats");
        }

        let profile = self.store.update_profile(&self.metrics)?;
        tracing::info!(
            session = %self.id,
            sessions = profile.total_sessions,
            "monitoring stopped"
        );
        Ok(profile)
    }

    fn receive(&mut self) -> Vec<AnalysisResponse> {
        let verdicts = self.transport.poll();
        for verdict in &verdicts {
            self.absorb_verdict(verdict);
        }
        self.transparency.record_verdicts(verdicts.len() as u64);
        verdicts
    }

    fn absorb_verdict(&mut self, verdict: &AnalysisResponse) {
        self.trust.apply(verdict);
        tracing::debug!(
            trust = self.trust.score,
            risk = verdict.risk_score,
            bot = verdict.bot_detected,
            "verdict received"
        );

        let entry = ActivityLog::from_verdict(verdict, Utc::now());
        if let Err(e) = self.store.append_log(entry, self.settings.opaque_storage) {
            tracing::warn!(error = %e, "could not persist activity entry");
        }
        self.last_verdict = Some(verdict.clone());
    }

    /// Queue the recent slice. Returns whether a payload went out.
    fn send_recent(&mut self) -> bool {
        let limit = self.settings.recent_event_limit;
        let mut payload = StreamPayload::from_recent(
            self.capture.recent_keys(limit),
            self.capture.recent_mouse(limit),
            self.settings.privacy_mode,
        );
        if let Some(usb) = self.pending_usb.take() {
            payload = payload.with_usb_event(usb);
        }
        if payload.is_empty() {
            return false;
        }
        tracing::debug!(
            keys = payload.keystrokes.len(),
            mouse = payload.mouse.len(),
            "streaming payload"
        );
        self.transport.send(&payload);
        self.transparency.record_payload_sent();
        self.unsent = false;
        true
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn trust(&self) -> &TrustState {
        &self.trust
    }

    pub fn last_verdict(&self) -> Option<&AnalysisResponse> {
        self.last_verdict.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn transport(&self) -> &StreamTransport<C, K> {
        &self.transport
    }

    pub fn capture(&self) -> &EventCapture {
        &self.capture
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }
}
