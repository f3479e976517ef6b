//! # kx-observability
//!
//! Logging and metrics infrastructure for Klaxon.
//!
//! This crate provides structured logging with tracing and Prometheus
//! metrics export for the alerting pipeline.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{init_metrics, register_metrics};
