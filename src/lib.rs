//! Sentinel Sensor - behavioral keystroke and pointer analysis.
//!
//! This library turns raw key transitions and pointer samples from a
//! monitored session into behavioral features, streams recent activity to a
//! remote analyzer, and keeps a local history of the analyzer's verdicts.
//!
//! # Privacy Guarantees
//!
//! - **Bounded buffers**: Raw events live only in fixed-size in-memory buffers
//! - **Pseudonymous keys**: In privacy mode key identities are hashed before
//!   they reach metrics or the network
//! - **Opaque history**: Stored verdicts can be encoded against casual reading
//! - **Transparency**: Everything captured and streamed is counted
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Sentinel Sensor                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ EventSource │──▶│EventCapture │──▶│  Features   │       │
//! │  │ (external)  │   │  (buffers)  │   │ (compute)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                  │              │
//! │                           ▼                  ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │   Stream    │◀─▶│ProfileStore │       │
//! │                    │  Transport  │   │  (history)  │       │
//! │                    └─────────────┘   └─────────────┘       │
//! │                           ▲                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │  Analyzer   │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sentinel_sensor::collector::{EventSource, SyntheticSource};
//! use sentinel_sensor::session::{MonitorSession, SessionSettings};
//! use sentinel_sensor::store::ProfileStore;
//! use sentinel_sensor::transparency::create_shared_log;
//! use sentinel_sensor::transport::{SystemClock, TcpLineChannel};
//!
//! let mut source = SyntheticSource::typing("hello", 0.0, 90.0, 120.0);
//! source.start().expect("Failed to start source");
//!
//! let mut session = MonitorSession::new(
//!     SessionSettings::default(),
//!     TcpLineChannel::new("127.0.0.1", 8765),
//!     SystemClock::new(),
//!     ProfileStore::in_memory(),
//!     create_shared_log(None),
//! );
//! session.start();
//! while let Some(event) = source.try_recv() {
//!     session.record(event);
//! }
//! session.tick();
//! ```

pub mod analyzer;
pub mod collector;
pub mod config;
pub mod core;
pub mod media;
pub mod session;
pub mod store;
pub mod transparency;
pub mod transport;

#[cfg(feature = "upload")]
pub mod upload;

// Re-export key types at crate root for convenience
pub use collector::{
    CollectorError, EventCapture, EventSource, KeyEvent, MouseEventData, SensorEvent,
};
pub use config::{AnalyzerSettings, Config};
pub use core::{
    compute_mouse_metrics, compute_session_metrics, AnalysisResponse, FocusLevel, SessionMetrics,
    TrustState,
};
pub use session::{MonitorSession, SessionSettings};
pub use store::{ActivityLog, ProfileStore, UserProfile};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};
pub use transport::{ConnectionStatus, StreamTransport, TransportError};

#[cfg(feature = "upload")]
pub use upload::{BackgroundUploader, UploadClient, UploadConfig, UploadError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              SENTINEL SENSOR - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This sensor analyzes how you type and move the pointer to       ║
║  tell organic input apart from injected input.                   ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • When keys go down and up, and which physical key            ║
║    • Pointer position samples and their timing                   ║
║                                                                  ║
║  ✓ WHAT LEAVES THIS MACHINE:                                     ║
║    • The most recent key transitions and pointer samples,        ║
║      sent to the configured analyzer only                        ║
║    • In privacy mode, key labels are replaced by short hashes    ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Application or window content                               ║
║    • Anything while monitoring is stopped                        ║
║                                                                  ║
║  Raw events are held in bounded memory buffers and are never     ║
║  written to disk. Only verdicts and long-run averages persist.   ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    sentinel-sensor status                                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER CAPTURE"));
        assert!(PRIVACY_DECLARATION.contains("privacy mode"));
    }
}
