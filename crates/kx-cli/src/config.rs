//! Configuration loading for the Klaxon CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use kx_core::{ClassifierConfig, DashboardConfig, GateConfig, PipelineConfig, TrackerConfig};

/// Application configuration.
///
/// Every section is optional in the YAML file; missing sections fall back
/// to the same defaults the pipeline uses when embedded directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline topics, consumer groups, and acknowledgement policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Severity classification thresholds.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Duplicate suppression and per-service rate limiting.
    #[serde(default)]
    pub gate: GateConfig,

    /// Incident retention and cleanup.
    #[serde(default)]
    pub incidents: TrackerConfig,

    /// Dashboard history and snapshot cadence.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// API server settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Bind host for the API server.
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Bind port for the API server.
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Whether to serve the Swagger UI.
    #[serde(default = "default_true")]
    pub enable_swagger: bool,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            enable_swagger: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.classifier.critical_threshold, 0.9);
        assert_eq!(config.gate.suppression_window_secs, 300);
        assert_eq!(config.incidents.retention_days, 90);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.api.port, 8080);
        assert!(config.api.enable_swagger);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
pipeline:
  min_anomaly_score: 0.2
  ack_policy: dead_letter_and_ack

classifier:
  critical_threshold: 0.95
  high_threshold: 0.8

gate:
  suppression_window_secs: 120
  max_alerts_per_service: 5

api:
  port: 9090
  enable_swagger: false

logging:
  level: debug
  json_format: true
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.min_anomaly_score, 0.2);
        assert_eq!(config.classifier.critical_threshold, 0.95);
        assert_eq!(config.classifier.high_threshold, 0.8);
        // Unset thresholds keep their defaults.
        assert_eq!(config.classifier.medium_threshold, 0.5);
        assert_eq!(config.gate.suppression_window_secs, 120);
        assert_eq!(config.gate.max_alerts_per_service, 5);
        assert_eq!(config.api.port, 9090);
        assert!(!config.api.enable_swagger);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "api:\n  port: 3000\n";

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.pipeline.scored_events_topic, "events.scored");
        assert_eq!(config.dashboard.history_capacity, 1000);
    }
}
