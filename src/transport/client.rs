//! Client side of the analyzer stream.

use crate::core::AnalysisResponse;
use crate::transport::backoff::BackoffConfig;
use crate::transport::channel::{Channel, ChannelEvent};
use crate::transport::message::parse_verdict;
use crate::transport::schedule::{Clock, ScheduledTask, SystemClock};
use crate::transport::{ConnectionStatus, TransportError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::VecDeque;

/// Delivered to the observer synchronously with each change.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotice {
    Status(ConnectionStatus),
    Error(TransportError),
}

type Observer = Box<dyn FnMut(&TransportNotice) + Send>;

/// Reconnecting message stream over a [`Channel`].
///
/// Outbound messages are queued while the channel is down and flushed in
/// order once it opens. Every closure other than [`disconnect`] schedules a
/// reconnect after an exponential backoff delay; the reconnect fires from
/// [`poll`] once the clock reaches it.
///
/// [`disconnect`]: StreamTransport::disconnect
/// [`poll`]: StreamTransport::poll
pub struct StreamTransport<C: Channel, K: Clock = SystemClock> {
    channel: C,
    clock: K,
    backoff: BackoffConfig,
    rng: StdRng,
    status: ConnectionStatus,
    queue: VecDeque<String>,
    attempts: u32,
    reconnect_enabled: bool,
    pending_reconnect: Option<ScheduledTask>,
    observer: Option<Observer>,
}

impl<C: Channel, K: Clock> StreamTransport<C, K> {
    pub fn new(channel: C, clock: K, backoff: BackoffConfig) -> Self {
        Self {
            channel,
            clock,
            backoff,
            rng: StdRng::from_entropy(),
            status: ConnectionStatus::Idle,
            queue: VecDeque::new(),
            attempts: 0,
            reconnect_enabled: false,
            pending_reconnect: None,
            observer: None,
        }
    }

    /// Use a fixed jitter seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Register the status observer, replacing any previous one.
    pub fn on_notice<F>(&mut self, observer: F)
    where
        F: FnMut(&TransportNotice) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    /// Closures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// When the pending reconnect fires, if one is scheduled.
    pub fn next_reconnect_at(&self) -> Option<u64> {
        self.pending_reconnect
            .as_ref()
            .filter(|task| !task.token().is_cancelled())
            .map(ScheduledTask::fire_at_ms)
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Open the channel. No-op while connecting or open.
    pub fn connect(&mut self) {
        if matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        ) {
            return;
        }
        self.reconnect_enabled = true;
        self.cancel_pending();
        self.open_channel();
    }

    /// Close the channel and stop reconnecting.
    pub fn disconnect(&mut self) {
        self.reconnect_enabled = false;
        self.cancel_pending();
        self.channel.close();
        self.set_status(ConnectionStatus::Closed);
    }

    /// Serialize and send `payload`, queueing it if the channel is down.
    pub fn send<T: Serialize>(&mut self, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_text(text),
            Err(e) => self.notify(TransportNotice::Error(TransportError::Serialize(
                e.to_string(),
            ))),
        }
    }

    /// Send a pre-serialized message, queueing it if the channel is down.
    pub fn send_text(&mut self, text: impl Into<String>) {
        self.queue.push_back(text.into());
        if self.is_open() {
            self.flush();
        }
    }

    /// Drain inbound messages and fire a due reconnect.
    ///
    /// Returns the verdicts received since the last poll. Unparsable messages
    /// are reported to the observer and skipped.
    pub fn poll(&mut self) -> Vec<AnalysisResponse> {
        let mut verdicts = Vec::new();

        while self.is_open() {
            let Some(event) = self.channel.poll_event() else {
                break;
            };
            match event {
                ChannelEvent::Message(text) => match parse_verdict(&text) {
                    Ok(verdict) => verdicts.push(verdict),
                    Err(e) => {
                        tracing::warn!("Dropping analyzer message: {}", e);
                        self.notify(TransportNotice::Error(e));
                    }
                },
                ChannelEvent::Closed => {
                    tracing::info!("Analyzer closed the connection");
                    self.on_channel_down(ConnectionStatus::Closed);
                }
                ChannelEvent::Error(reason) => {
                    tracing::warn!("Analyzer connection failed: {}", reason);
                    self.notify(TransportNotice::Error(TransportError::Closed(reason)));
                    self.on_channel_down(ConnectionStatus::Error);
                }
            }
        }

        let now = self.clock.now_ms();
        if self
            .pending_reconnect
            .as_ref()
            .is_some_and(|task| task.is_due(now))
        {
            self.pending_reconnect = None;
            if self.reconnect_enabled {
                tracing::debug!("Reconnect attempt {}", self.attempts);
                self.open_channel();
            }
        }

        verdicts
    }

    fn open_channel(&mut self) {
        self.set_status(ConnectionStatus::Connecting);
        match self.channel.open() {
            Ok(()) => {
                self.set_status(ConnectionStatus::Open);
                self.attempts = 0;
                self.flush();
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.notify(TransportNotice::Error(e));
                self.on_channel_down(ConnectionStatus::Error);
            }
        }
    }

    /// Send queued messages in order, stopping at the first failure.
    ///
    /// If the failure cost the channel its connection, the failed message is
    /// resent first on the next connection.
    fn flush(&mut self) {
        while let Some(text) = self.queue.pop_front() {
            if let Err(e) = self.channel.send(&text) {
                self.queue.push_front(text);
                tracing::warn!("{}; {} message(s) queued", e, self.queue.len());
                self.notify(TransportNotice::Error(e));
                if !self.channel.is_connected() {
                    self.on_channel_down(ConnectionStatus::Error);
                }
                break;
            }
        }
    }

    fn on_channel_down(&mut self, status: ConnectionStatus) {
        self.channel.close();
        self.set_status(status);
        self.attempts = self.attempts.saturating_add(1);

        if self.reconnect_enabled {
            let delay = self.backoff.delay_ms(self.attempts, &mut self.rng);
            let fire_at = self.clock.now_ms() + delay;
            tracing::info!("Reconnecting in {} ms (attempt {})", delay, self.attempts);
            self.cancel_pending();
            self.pending_reconnect = Some(ScheduledTask::at(fire_at));
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending_reconnect.take() {
            task.cancel();
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        tracing::info!("Transport {} -> {}", self.status, status);
        self.status = status;
        self.notify(TransportNotice::Status(status));
    }

    fn notify(&mut self, notice: TransportNotice) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&notice);
        }
    }
}
