//! Bidirectional message channel to the analyzer.

use crate::transport::TransportError;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Something the channel observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// One complete inbound message
    Message(String),
    /// The far end closed the connection
    Closed,
    /// The connection failed
    Error(String),
}

/// A message-oriented, non-blocking duplex channel.
pub trait Channel {
    /// Establish the connection.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Transmit one message.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Next pending event, `None` when nothing is ready.
    fn poll_event(&mut self) -> Option<ChannelEvent>;

    /// Drop the connection. Safe to call when not open.
    fn close(&mut self);

    /// Whether the connection is still usable. A failed send that leaves
    /// the stream in an unknown state reports `false` here.
    fn is_connected(&self) -> bool {
        true
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Longest inbound line accepted before the connection is dropped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Newline-delimited JSON over TCP.
pub struct TcpLineChannel {
    addr: String,
    stream: Option<TcpStream>,
    read_buf: Vec<u8>,
}

impl TcpLineChannel {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            stream: None,
            read_buf: Vec::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.read_buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.read_buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

impl Channel for TcpLineChannel {
    fn open(&mut self) -> Result<(), TransportError> {
        self.close();

        let addrs = self
            .addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.addr)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    let configured = stream
                        .set_read_timeout(Some(READ_POLL_TIMEOUT))
                        .and_then(|_| stream.set_write_timeout(Some(WRITE_TIMEOUT)))
                        .and_then(|_| stream.set_nodelay(true));
                    if let Err(e) = configured {
                        last_err = Some(e.to_string());
                        continue;
                    }
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_err = Some(e.to_string()),
            }
        }

        Err(TransportError::Connect(format!(
            "{}: {}",
            self.addr,
            last_err.unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::Send("channel not open".to_string()))?;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        let written = stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.flush());

        // A partial write leaves an unterminated line on the socket
        if let Err(e) = written {
            self.close();
            return Err(TransportError::Send(e.to_string()));
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<ChannelEvent> {
        if let Some(line) = self.take_line() {
            return Some(ChannelEvent::Message(line));
        }

        let stream = self.stream.as_mut()?;
        let mut buf = [0u8; 4096];
        match stream.read(&mut buf) {
            Ok(0) => {
                self.stream = None;
                Some(ChannelEvent::Closed)
            }
            Ok(n) => {
                self.read_buf.extend_from_slice(&buf[..n]);
                if let Some(line) = self.take_line() {
                    return Some(ChannelEvent::Message(line));
                }
                if self.read_buf.len() > MAX_LINE_BYTES {
                    let len = self.read_buf.len();
                    self.close();
                    return Some(ChannelEvent::Error(format!(
                        "inbound line exceeds {MAX_LINE_BYTES} bytes ({len} buffered)"
                    )));
                }
                None
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => None,
            Err(e) if e.kind() == ErrorKind::Interrupted => None,
            Err(e) => {
                self.stream = None;
                Some(ChannelEvent::Error(e.to_string()))
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.read_buf.clear();
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn test_line_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut writer = stream;
            writer
                .write_all(format!("echo:{}\n", line.trim()).as_bytes())
                .unwrap();
        });

        let mut channel = TcpLineChannel::new("127.0.0.1", port);
        channel.open().unwrap();
        channel.send("hello").unwrap();

        let mut received = None;
        for _ in 0..2000 {
            match channel.poll_event() {
                Some(ChannelEvent::Message(m)) => {
                    received = Some(m);
                    break;
                }
                Some(other) => panic!("unexpected event {other:?}"),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        assert_eq!(received.as_deref(), Some("echo:hello"));

        server.join().unwrap();
        let mut closed = false;
        for _ in 0..2000 {
            match channel.poll_event() {
                Some(ChannelEvent::Closed) | Some(ChannelEvent::Error(_)) => {
                    closed = true;
                    break;
                }
                _ => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        assert!(closed);
    }

    #[test]
    fn test_oversized_line_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let flood = vec![b'x'; MAX_LINE_BYTES + 4096];
            let _ = stream.write_all(&flood);
        });

        let mut channel = TcpLineChannel::new("127.0.0.1", port);
        channel.open().unwrap();

        let mut failure = None;
        for _ in 0..20_000 {
            match channel.poll_event() {
                Some(ChannelEvent::Error(reason)) => {
                    failure = Some(reason);
                    break;
                }
                Some(other) => panic!("unexpected event {other:?}"),
                None => std::thread::sleep(Duration::from_micros(100)),
            }
        }
        assert!(failure.is_some_and(|r| r.contains("exceeds")));
        assert!(!channel.is_connected());
        assert!(channel.read_buf.is_empty());
        server.join().unwrap();
    }

    #[test]
    fn test_failed_send_drops_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut channel = TcpLineChannel::new("127.0.0.1", port);
        channel.open().unwrap();
        assert!(channel.is_connected());

        let (peer, _) = listener.accept().unwrap();
        drop(peer);
        drop(listener);

        let mut failed = false;
        for _ in 0..200 {
            if channel.send("payload").is_err() {
                failed = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(failed);
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.send("again"),
            Err(TransportError::Send(_))
        ));
    }

    #[test]
    fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut channel = TcpLineChannel::new("127.0.0.1", port);
        assert!(matches!(channel.open(), Err(TransportError::Connect(_))));
        assert!(channel.send("x").is_err());
        assert_eq!(channel.poll_event(), None);
    }
}
