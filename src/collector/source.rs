//! Producer abstraction for raw input events.
//!
//! A source is subscribed with [`EventSource::start`] and unsubscribed with
//! [`EventSource::stop`]. Events are delivered over a bounded channel so the
//! consumer drains them in arrival order from a single thread.

use crate::collector::types::SensorEvent;
use crossbeam_channel::Receiver;
use thiserror::Error;

/// Capacity of the channel between a source and its consumer.
pub const SOURCE_CHANNEL_CAPACITY: usize = 10_000;

/// Errors that can occur during event collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Failed to spawn collector thread: {0}")]
    ThreadSpawn(String),
    #[error("Source has already been consumed")]
    Exhausted,
}

/// A permission-gated producer of raw key and pointer events.
pub trait EventSource {
    /// Subscribe to the underlying producer.
    fn start(&mut self) -> Result<(), CollectorError>;

    /// Unsubscribe. Events already queued remain readable.
    fn stop(&mut self);

    /// Whether the source is currently subscribed.
    fn is_active(&self) -> bool;

    /// Receiver end of the event channel.
    fn receiver(&self) -> &Receiver<SensorEvent>;

    /// Try to receive an event without blocking.
    fn try_recv(&self) -> Option<SensorEvent> {
        self.receiver().try_recv().ok()
    }
}
