//! Score-to-severity classification.

use serde::{Deserialize, Serialize};

use crate::alert::Severity;

/// Classification thresholds, compared with `>=` from critical downward so a
/// score exactly on a boundary lands in the stricter tier. Anything below the
/// low threshold maps to INFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
}

fn default_critical_threshold() -> f64 {
    0.9
}

fn default_high_threshold() -> f64 {
    0.7
}

fn default_medium_threshold() -> f64 {
    0.5
}

fn default_low_threshold() -> f64 {
    0.3
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            critical_threshold: default_critical_threshold(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            low_threshold: default_low_threshold(),
        }
    }
}

impl ClassifierConfig {
    /// Maps an anomaly score to its severity tier.
    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.critical_threshold {
            Severity::Critical
        } else if score >= self.high_threshold {
            Severity::High
        } else if score >= self.medium_threshold {
            Severity::Medium
        } else if score >= self.low_threshold {
            Severity::Low
        } else {
            Severity::Info
        }
    }

    /// Thresholds must be strictly descending and within [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        let thresholds = [
            ("critical", self.critical_threshold),
            ("high", self.high_threshold),
            ("medium", self.medium_threshold),
            ("low", self.low_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "{} threshold {} is outside [0, 1]",
                    name, value
                ));
            }
        }
        if !(self.critical_threshold > self.high_threshold
            && self.high_threshold > self.medium_threshold
            && self.medium_threshold > self.low_threshold)
        {
            return Err(format!(
                "thresholds must be strictly descending: critical {} > high {} > medium {} > low {}",
                self.critical_threshold,
                self.high_threshold,
                self.medium_threshold,
                self.low_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_classify_each_band() {
        let config = ClassifierConfig::default();
        assert_eq!(config.classify(0.95), Severity::Critical);
        assert_eq!(config.classify(0.8), Severity::High);
        assert_eq!(config.classify(0.6), Severity::Medium);
        assert_eq!(config.classify(0.35), Severity::Low);
        assert_eq!(config.classify(0.1), Severity::Info);
        assert_eq!(config.classify(0.0), Severity::Info);
    }

    #[test]
    fn score_on_a_threshold_takes_the_stricter_tier() {
        let config = ClassifierConfig::default();
        assert_eq!(config.classify(0.9), Severity::Critical);
        assert_eq!(config.classify(0.7), Severity::High);
        assert_eq!(config.classify(0.5), Severity::Medium);
        assert_eq!(config.classify(0.3), Severity::Low);
        assert_eq!(config.classify(0.299999), Severity::Info);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let config = ClassifierConfig {
            critical_threshold: 0.99,
            high_threshold: 0.95,
            medium_threshold: 0.6,
            low_threshold: 0.2,
        };
        assert_eq!(config.classify(0.96), Severity::High);
        assert_eq!(config.classify(0.5), Severity::Low);
    }

    #[test]
    fn validate_rejects_non_descending_thresholds() {
        let mut config = ClassifierConfig::default();
        assert!(config.validate().is_ok());

        config.high_threshold = 0.95;
        assert!(config.validate().is_err());

        let out_of_range = ClassifierConfig {
            critical_threshold: 1.5,
            ..ClassifierConfig::default()
        };
        assert!(out_of_range.validate().is_err());
    }
}
