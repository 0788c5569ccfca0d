//! Resilient streaming transport to the remote analyzer.
//!
//! [`StreamTransport`] drives a [`Channel`] through the connection state
//! machine, queues outbound payloads while the channel is down, and retries
//! with exponential backoff until explicitly disconnected. Failures surface
//! only as [`TransportNotice`]s, never as errors from the call sites.

pub mod backoff;
pub mod channel;
pub mod client;
pub mod message;
pub mod schedule;

pub use backoff::BackoffConfig;
pub use channel::{Channel, ChannelEvent, TcpLineChannel};
pub use client::{StreamTransport, TransportNotice};
pub use message::{
    parse_verdict, KeystrokeKind, KeystrokeRecord, PointerRecord, StreamPayload, UsbEvent,
};
pub use schedule::{CancellationToken, Clock, ManualClock, PeriodicTask, ScheduledTask, SystemClock};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Connection state reported to the status observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Recoverable transport failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("channel closed: {0}")]
    Closed(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("analyzer rejected payload: {0}")]
    Rejected(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
}
