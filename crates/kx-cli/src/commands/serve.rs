//! Serve command - starts the pipeline and the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kx_api::{ApiServer, ApiServerConfig, AppState};
use kx_core::{InMemoryMessageQueue, Pipeline};
use kx_observability::init_metrics;

use crate::config::AppConfig;

/// Server configuration from CLI arguments.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Port to listen on.
    pub port: u16,
    /// Hostname to bind to.
    pub host: String,
    /// Enable Swagger UI.
    pub enable_swagger: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            enable_swagger: true,
            timeout_secs: 30,
        }
    }
}

/// Runs the alerting pipeline with the API server in front of it.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Klaxon...", "[server]".cyan());

    // Install the Prometheus recorder before any pipeline metrics fire
    println!("  {} Installing metrics recorder...", "→".green());
    let prometheus_handle = init_metrics().context("Failed to install Prometheus recorder")?;

    // Producers and consumers share this in-process queue
    let queue = Arc::new(InMemoryMessageQueue::new());

    println!("  {} Building pipeline...", "→".green());
    let pipeline = Arc::new(
        Pipeline::builder(queue)
            .config(app_config.pipeline.clone())
            .classifier(app_config.classifier.clone())
            .gate_config(app_config.gate.clone())
            .tracker_config(app_config.incidents.clone())
            .dashboard_config(app_config.dashboard.clone())
            .build(),
    );

    pipeline.start().await.context("Failed to start pipeline")?;
    println!("  {} Pipeline consumers running", "✓".green());

    // Create application state
    let state = AppState::new(pipeline.clone()).with_prometheus_handle(prometheus_handle);

    // Build server config
    let bind_address: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    let server_config = ApiServerConfig {
        bind_address,
        request_timeout: Duration::from_secs(config.timeout_secs),
        enable_swagger: config.enable_swagger,
        shutdown_timeout: Duration::from_secs(30),
    };

    // Print startup info
    println!();
    println!("{}", "Klaxon Alert Manager".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    println!(
        "  {} {} (score floor {})",
        "Scored topic:".cyan(),
        app_config.pipeline.scored_events_topic,
        app_config.pipeline.min_anomaly_score
    );

    if config.enable_swagger {
        println!(
            "  {} http://{}/swagger-ui",
            "Swagger UI:".cyan(),
            bind_address
        );
    }

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET  /health                     - Health check");
    println!("  GET  /ready                      - Readiness probe");
    println!("  GET  /live                       - Liveness probe");
    println!("  GET  /api/incidents              - List incidents");
    println!("  GET  /api/incidents/:id          - Get incident");
    println!("  POST /api/incidents/:id/comments - Comment on incident");
    println!("  GET  /api/dashboard/summary      - Dashboard summary");
    println!("  POST /api/alerts/test            - Publish test alert");
    println!("  GET  /metrics                    - Prometheus metrics");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    // Create and run server
    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    // Stop consumers and maintenance tasks
    pipeline.shutdown().await;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}
