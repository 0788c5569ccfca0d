//! Transparency module for the sentinel sensor.
//!
//! Counts what the sensor has observed and shipped so the user can see it,
//! without retaining any of the event content.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
