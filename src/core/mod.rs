//! Core functionality.
//!
//! This module contains:
//! - Feature computation over raw key and pointer buffers
//! - Privacy-mode key pseudonyms
//! - Analyzer verdicts and trust state

pub mod features;
pub mod privacy;
pub mod verdict;

// Re-export commonly used types
pub use features::{
    compute_mouse_metrics, compute_session_metrics, KeyMetrics, MouseMetrics, SessionMetrics,
};
pub use privacy::{hash_key_code, key_identifier};
pub use verdict::{AnalysisResponse, FocusLevel, TrustState};
