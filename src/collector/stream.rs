//! Event source reading newline-delimited JSON events.
//!
//! The permission-gated device hook runs in a separate process and writes one
//! [`SensorEvent`] per line; this source forwards them into the core on a
//! background thread.

use crate::collector::source::{CollectorError, EventSource, SOURCE_CHANNEL_CAPACITY};
use crate::collector::types::SensorEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A source fed by a line-oriented reader (usually stdin or a pipe).
pub struct JsonLinesSource {
    reader: Option<Box<dyn BufRead + Send>>,
    sender: Sender<SensorEvent>,
    receiver: Receiver<SensorEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl JsonLinesSource {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(SOURCE_CHANNEL_CAPACITY);

        Self {
            reader: Some(Box::new(reader)),
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Read events from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }

    /// Whether the reader thread has finished (end of input or stopped).
    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(self.reader.is_none())
    }
}

impl EventSource for JsonLinesSource {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let reader = self.reader.take().ok_or(CollectorError::Exhausted)?;

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("event-reader".to_string())
            .spawn(move || {
                read_events(reader, &sender, &running);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CollectorError::ThreadSpawn(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        // A blocked read cannot be interrupted; the thread exits on its next line.
        self.running.store(false, Ordering::SeqCst);
        self.thread_handle = None;
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<SensorEvent> {
        &self.receiver
    }
}

fn read_events(reader: Box<dyn BufRead + Send>, sender: &Sender<SensorEvent>, running: &AtomicBool) {
    for (line_no, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "event reader failed");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<SensorEvent>(trimmed) {
            Ok(event) => {
                // Blocks when the consumer falls behind so arrival order is kept
                if sender.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "skipping malformed event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{KeyEvent, MouseEventData};
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn test_reads_events_and_skips_garbage() {
        let input = concat!(
            r#"{"kind":"key","key":"a","code":"KeyA","timestamp":0.0,"direction":"down"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"kind":"mouse","x":3.0,"y":4.0,"timestamp":10.0}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(Cursor::new(input.as_bytes().to_vec()));
        source.start().unwrap();

        let first = source.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        let second = source.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, SensorEvent::Key(KeyEvent::down("a", "KeyA", 0.0)));
        assert_eq!(second, SensorEvent::Mouse(MouseEventData::new(3.0, 4.0, 10.0)));
        assert!(source.receiver().recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_cannot_restart_consumed_reader() {
        let mut source = JsonLinesSource::new(Cursor::new(Vec::new()));
        source.start().unwrap();
        source.stop();
        assert!(matches!(source.start(), Err(CollectorError::Exhausted)));
    }
}
