//! Configuration for the sentinel sensor.

use crate::transport::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analyzer host
    pub analyzer_host: String,

    /// Analyzer port
    pub analyzer_port: u16,

    /// How often the recent event slice is streamed to the analyzer
    #[serde(with = "duration_ms_serde")]
    pub upload_interval: Duration,

    /// Number of most recent key transitions and pointer samples per payload
    pub recent_event_limit: usize,

    /// Maximum events retained per capture buffer
    pub buffer_capacity: usize,

    /// Minimum spacing between accepted pointer samples (0 keeps all)
    pub mouse_sample_interval_ms: u64,

    /// Pseudonymise key identities in metrics and outbound payloads
    pub privacy_mode: bool,

    /// Store activity history in opaque encoded form
    pub opaque_storage: bool,

    /// Reconnect backoff
    pub reconnect: BackoffConfig,

    /// Settings for the bundled reference analyzer
    pub analyzer: AnalyzerSettings,

    /// Path for persisted history, profile and transparency stats
    pub data_path: PathBuf,

    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sentinel-sensor");

        Self {
            analyzer_host: "127.0.0.1".to_string(),
            analyzer_port: 8765,
            upload_interval: Duration::from_millis(1000),
            recent_event_limit: 200,
            buffer_capacity: 10_000,
            mouse_sample_interval_ms: 16,
            privacy_mode: false,
            opaque_storage: false,
            reconnect: BackoffConfig::default(),
            analyzer: AnalyzerSettings::default(),
            data_path: data_dir,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sentinel-sensor")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Path of the persisted transparency stats.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency_stats.json")
    }
}

/// Scoring parameters for the reference analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub initial_trust: i32,
    pub trust_min: i32,
    pub trust_max: i32,
    /// Idle window after which trust decays
    #[serde(with = "duration_ms_serde")]
    pub idle_decay_interval: Duration,
    /// Points removed per idle window
    pub idle_decay_points: i32,
    /// Average pointer speed treated as machine-driven, px/ms
    pub bot_velocity_threshold: f64,
    /// Angular velocity below which motion counts as a straight line, rad/ms
    pub bot_angular_epsilon: f64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            initial_trust: 80,
            trust_min: 0,
            trust_max: 100,
            idle_decay_interval: Duration::from_secs(2),
            idle_decay_points: 5,
            bot_velocity_threshold: 0.8,
            bot_angular_epsilon: 0.000_05,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analyzer_port, 8765);
        assert_eq!(config.upload_interval, Duration::from_millis(1000));
        assert_eq!(config.recent_event_limit, 200);
        assert_eq!(config.reconnect.base_ms, 500);
        assert_eq!(config.analyzer.initial_trust, 80);
        assert!(!config.privacy_mode);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"analyzer_port": 9000, "upload_interval": 250}"#).unwrap();
        assert_eq!(config.analyzer_port, 9000);
        assert_eq!(config.upload_interval, Duration::from_millis(250));
        assert_eq!(config.analyzer_host, "127.0.0.1");
        assert_eq!(config.analyzer.idle_decay_points, 5);
    }

    #[test]
    fn test_duration_serialized_as_millis() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["upload_interval"], 1000);
        assert_eq!(json["analyzer"]["idle_decay_interval"], 2000);
    }
}
