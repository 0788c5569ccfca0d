//! Still-image frames forwarded alongside the event stream.
//!
//! Frames are produced by an external capture collaborator and handed to an
//! upload sink on their own cadence. Nothing here inspects frame content.

use crate::transport::PeriodicTask;
use chrono::{DateTime, Utc};
use std::path::Path;

/// One captured still image.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFrame {
    pub captured_at: DateTime<Utc>,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFrame {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            captured_at: Utc::now(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an image file, inferring the MIME type from its extension.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let mime_type = match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        };
        Ok(Self::new(mime_type, bytes))
    }
}

/// Produces frames on demand, `None` when no frame is available.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<MediaFrame>;
}

/// Accepts frames for delivery. Never reports failure to the caller.
pub trait FrameSink: Send {
    fn submit(&mut self, frame: MediaFrame);
}

/// Pulls from a source and pushes to a sink once per period.
pub struct FrameRelay {
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    task: PeriodicTask,
    forwarded: u64,
}

impl FrameRelay {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        interval_ms: u64,
        now_ms: u64,
    ) -> Self {
        Self {
            source,
            sink,
            task: PeriodicTask::new(interval_ms, now_ms),
            forwarded: 0,
        }
    }

    /// Forward one frame if the period elapsed. Returns whether one was sent.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.task.poll(now_ms) {
            return false;
        }
        match self.source.next_frame() {
            Some(frame) => {
                tracing::debug!(bytes = frame.bytes.len(), "forwarding frame");
                self.sink.submit(frame);
                self.forwarded += 1;
                true
            }
            None => false,
        }
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}
