//! 运行配置
//!
//! All fields default to the values the swarm firmware is tuned for, so an
//! empty TOML document (or no file at all) is a valid configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub network: NetworkConfig,
    pub dispatch: DispatchConfig,
    pub sync: SyncConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Settle time before and after the purge broadcast.
    pub purge_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { purge_delay_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pause after a gait upload so devices can finish writing it.
    pub gait_pacing_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { gait_pacing_ms: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Subtracted from the gait period to absorb radio latency.
    pub drift_correction_us: u64,
    /// Record the wall-clock time of every sync pulse.
    pub keep_time: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_correction_us: 35_700,
            keep_time: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Default nominal period of stream jobs.
    pub period_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { period_ms: 100 }
    }
}

impl SwarmConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn purge_delay(&self) -> Duration {
        Duration::from_millis(self.network.purge_delay_ms)
    }

    pub fn gait_pacing(&self) -> Duration {
        Duration::from_millis(self.dispatch.gait_pacing_ms)
    }

    pub fn drift_correction(&self) -> Duration {
        Duration::from_micros(self.sync.drift_correction_us)
    }

    pub fn stream_period(&self) -> Duration {
        Duration::from_millis(self.stream.period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SwarmConfig::from_toml_str("").unwrap();
        assert_eq!(config, SwarmConfig::default());
        assert_eq!(config.purge_delay(), Duration::from_millis(500));
        assert_eq!(config.drift_correction(), Duration::from_micros(35_700));
        assert!(!config.sync.keep_time);
    }

    #[test]
    fn test_partial_override() {
        let config = SwarmConfig::from_toml_str(
            r#"
            [sync]
            keep_time = true

            [stream]
            period_ms = 50
            "#,
        )
        .unwrap();
        assert!(config.sync.keep_time);
        assert_eq!(config.sync.drift_correction_us, 35_700);
        assert_eq!(config.stream_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\npurge_delay_ms = 10").unwrap();
        let config = SwarmConfig::load(file.path()).unwrap();
        assert_eq!(config.purge_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_document() {
        let err = SwarmConfig::from_toml_str("[sync]\nkeep_time = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_roundtrip_string() {
        let text = SwarmConfig::default().to_toml_string().unwrap();
        assert_eq!(SwarmConfig::from_toml_str(&text).unwrap(), SwarmConfig::default());
    }
}
