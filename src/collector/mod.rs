//! Event collection module.
//!
//! Raw key transitions and pointer samples arrive from an [`EventSource`] and
//! are appended to the session's [`EventCapture`] buffers.

pub mod capture;
pub mod source;
pub mod stream;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use capture::EventCapture;
pub use source::{CollectorError, EventSource};
pub use stream::JsonLinesSource;
pub use synthetic::SyntheticSource;
pub use types::{KeyDirection, KeyEvent, MouseEventData, SensorEvent, BACKSPACE_CODE};
