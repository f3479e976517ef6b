//! Configuration validation for Klaxon.
//!
//! This module provides startup validation so misconfigured thresholds,
//! topics, or maintenance intervals are caught before the pipeline starts.

use crate::config::AppConfig;
use colored::Colorize;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Critical errors that prevent startup.
    pub errors: Vec<String>,
    /// Warnings that should be addressed but don't prevent startup.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Creates a new empty validation result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before startup.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the application configuration.
    ///
    /// Returns a ValidationResult containing any errors and warnings found.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_classifier(config, &mut result);
        Self::validate_pipeline(config, &mut result);
        Self::validate_gate(config, &mut result);
        Self::validate_incidents(config, &mut result);
        Self::validate_dashboard(config, &mut result);
        Self::validate_api(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    /// Validates severity classification thresholds.
    fn validate_classifier(config: &AppConfig, result: &mut ValidationResult) {
        if let Err(e) = config.classifier.validate() {
            result.add_error(format!("Invalid classifier thresholds: {}", e));
        }
    }

    /// Validates pipeline topics, consumer groups, and the score floor.
    fn validate_pipeline(config: &AppConfig, result: &mut ValidationResult) {
        let pipeline = &config.pipeline;

        if !(0.0..=1.0).contains(&pipeline.min_anomaly_score) {
            result.add_error(format!(
                "pipeline.min_anomaly_score {} is outside the valid range (0.0 - 1.0)",
                pipeline.min_anomaly_score
            ));
        } else if pipeline.min_anomaly_score >= config.classifier.critical_threshold {
            result.add_warning(format!(
                "pipeline.min_anomaly_score {} is at or above the critical threshold {}. \
                 Only critical events will get past the score floor.",
                pipeline.min_anomaly_score, config.classifier.critical_threshold
            ));
        }

        let required = [
            ("pipeline.scored_events_topic", &pipeline.scored_events_topic),
            ("pipeline.raw_events_topic", &pipeline.raw_events_topic),
            (
                "pipeline.alert_consumer_group",
                &pipeline.alert_consumer_group,
            ),
            (
                "pipeline.incident_consumer_group",
                &pipeline.incident_consumer_group,
            ),
            (
                "pipeline.dashboard_consumer_group",
                &pipeline.dashboard_consumer_group,
            ),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                result.add_error(format!("{} must not be empty", field));
            }
        }
    }

    /// Validates suppression and rate limit settings.
    fn validate_gate(config: &AppConfig, result: &mut ValidationResult) {
        let gate = &config.gate;

        if gate.max_alerts_per_service == 0 {
            result.add_error(
                "gate.max_alerts_per_service must be greater than zero. \
                 A zero limit would rate-limit every alert."
                    .to_string(),
            );
        }

        if gate.suppression_window_secs == 0 {
            result.add_warning(
                "gate.suppression_window_secs is 0. Duplicate suppression is disabled and \
                 repeated alerts will all be admitted."
                    .to_string(),
            );
        }

        if gate.sweep_interval_secs == 0 {
            result.add_error("gate.sweep_interval_secs must be greater than zero");
        }

        if gate.counter_reset_interval_secs == 0 {
            result.add_error("gate.counter_reset_interval_secs must be greater than zero");
        }
    }

    /// Validates incident retention settings.
    fn validate_incidents(config: &AppConfig, result: &mut ValidationResult) {
        if config.incidents.retention_days <= 0 {
            result.add_error(format!(
                "incidents.retention_days must be positive, got {}",
                config.incidents.retention_days
            ));
        }

        if config.incidents.cleanup_interval_secs == 0 {
            result.add_error("incidents.cleanup_interval_secs must be greater than zero");
        }
    }

    /// Validates dashboard history settings.
    fn validate_dashboard(config: &AppConfig, result: &mut ValidationResult) {
        if config.dashboard.history_capacity == 0 {
            result.add_error(
                "dashboard.history_capacity must be greater than zero. \
                 A zero capacity would discard every alert immediately."
                    .to_string(),
            );
        }

        if config.dashboard.snapshot_interval_secs == 0 {
            result.add_error("dashboard.snapshot_interval_secs must be greater than zero");
        }
    }

    /// Validates API server settings.
    fn validate_api(config: &AppConfig, result: &mut ValidationResult) {
        if config.api.host.parse::<std::net::IpAddr>().is_err() {
            result.add_error(format!(
                "api.host '{}' is not a valid bind address. \
                 Use an IP address such as 127.0.0.1 or 0.0.0.0.",
                config.api.host
            ));
        }

        if config.api.port == 0 {
            result.add_warning(
                "api.port is 0. The OS will assign a random port at startup.".to_string(),
            );
        }
    }

    /// Validates the logging level.
    fn validate_logging(config: &AppConfig, result: &mut ValidationResult) {
        if config.logging.level.parse::<tracing::Level>().is_err() {
            result.add_error(format!(
                "Invalid logging.level '{}'. Must be one of: trace, debug, info, warn, error",
                config.logging.level
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn test_validation_result_operations() {
        let mut result = ValidationResult::new();
        assert!(!result.has_errors());
        assert!(!result.has_warnings());

        result.add_error("Test error");
        assert!(result.has_errors());

        result.add_warning("Test warning");
        assert!(result.has_warnings());

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_default_config_is_clean() {
        let result = ConfigValidator::validate(&default_config());
        assert!(!result.has_errors());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_non_descending_thresholds_rejected() {
        let mut config = default_config();
        config.classifier.high_threshold = 0.95; // At or above critical

        let mut result = ValidationResult::new();
        ConfigValidator::validate_classifier(&config, &mut result);

        assert!(result.has_errors());
    }

    #[test]
    fn test_score_floor_out_of_range() {
        let mut config = default_config();
        config.pipeline.min_anomaly_score = 1.5;

        let mut result = ValidationResult::new();
        ConfigValidator::validate_pipeline(&config, &mut result);

        assert!(result.has_errors());
    }

    #[test]
    fn test_score_floor_above_critical_warns() {
        let mut config = default_config();
        config.pipeline.min_anomaly_score = 0.95;

        let mut result = ValidationResult::new();
        ConfigValidator::validate_pipeline(&config, &mut result);

        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_empty_topic_rejected() {
        let mut config = default_config();
        config.pipeline.scored_events_topic = String::new();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_pipeline(&config, &mut result);

        assert!(result.has_errors());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = default_config();
        config.gate.max_alerts_per_service = 0;

        let mut result = ValidationResult::new();
        ConfigValidator::validate_gate(&config, &mut result);

        assert!(result.has_errors());
    }

    #[test]
    fn test_zero_suppression_window_warns() {
        let mut config = default_config();
        config.gate.suppression_window_secs = 0;

        let mut result = ValidationResult::new();
        ConfigValidator::validate_gate(&config, &mut result);

        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_zero_maintenance_intervals_rejected() {
        let mut config = default_config();
        config.gate.sweep_interval_secs = 0;
        config.incidents.cleanup_interval_secs = 0;
        config.dashboard.snapshot_interval_secs = 0;

        let result = ConfigValidator::validate(&config);

        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_hostname_bind_address_rejected() {
        let mut config = default_config();
        config.api.host = "localhost".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_api(&config, &mut result);

        assert!(result.has_errors());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in &["trace", "debug", "info", "warn", "error"] {
            let mut config = default_config();
            config.logging.level = level.to_string();

            let mut result = ValidationResult::new();
            ConfigValidator::validate_logging(&config, &mut result);

            assert!(!result.has_errors(), "Level '{}' should be valid", level);
        }
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = default_config();
        config.logging.level = "verbose".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_logging(&config, &mut result);

        assert!(result.has_errors());
    }
}
