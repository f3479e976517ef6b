//! Klaxon CLI
//!
//! Command-line interface for the Klaxon alerting pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod api_client;
mod commands;
mod config;
mod validator;

use api_client::{ApiClient, CommentBody, ListIncidentsParams};
use commands::{run_server, ServeConfig};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "klaxon")]
#[command(author = "Klaxon Contributors")]
#[command(version)]
#[command(about = "Alert manager for anomaly-scored event streams", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// API server URL (for remote commands)
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the pipeline and API server
    Serve {
        /// Port to listen on (defaults to api.port from the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to api.host from the config file)
        #[arg(long)]
        host: Option<String>,

        /// Disable Swagger UI
        #[arg(long)]
        no_swagger: bool,

        /// Validate configuration and exit without starting the server
        #[arg(long)]
        validate_only: bool,
    },

    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the resolved configuration
    Config,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Manage incidents
    Incident {
        #[command(subcommand)]
        action: IncidentCommands,
    },

    /// Show the dashboard summary
    Dashboard,

    /// Show server status
    Status,

    /// Publish a test alert through the pipeline
    Test,
}

#[derive(Subcommand)]
enum IncidentCommands {
    /// List incidents
    List {
        /// Filter by service name
        #[arg(long)]
        service: Option<String>,

        /// Filter by status (comma-separated)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by severity (comma-separated)
        #[arg(long)]
        severity: Option<String>,

        /// Maximum number of incidents to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show incident details
    Show {
        /// Incident ID
        id: String,
    },

    /// Add a comment to an incident
    Comment {
        /// Incident ID
        id: String,

        /// Comment text
        message: String,

        /// User recorded in the event log
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    kx_observability::logging::init_logging_with_config(kx_observability::logging::LoggingConfig {
        level: log_level,
        json_format: cli.format == OutputFormat::Json,
        ..Default::default()
    });

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|_| {
        if cli.verbose {
            eprintln!("Using default configuration (no config file found)");
        }
        AppConfig::default()
    });

    // Execute command
    match cli.command {
        Commands::Serve {
            port,
            host,
            no_swagger,
            validate_only,
        } => {
            let serve_config = ServeConfig {
                port: port.unwrap_or(config.api.port),
                host: host.unwrap_or_else(|| config.api.host.clone()),
                enable_swagger: !no_swagger && config.api.enable_swagger,
                timeout_secs: 30,
            };
            cmd_serve(serve_config, config, validate_only).await
        }
        Commands::Validate { config: cfg_path } => {
            cmd_validate(cfg_path.unwrap_or(config_path)).await
        }
        Commands::Config => cmd_config(config, cli.format).await,
        Commands::Init { force } => cmd_init(config_path, force).await,
        Commands::Incident { action } => cmd_incident(action, cli.format, &cli.api_url).await,
        Commands::Dashboard => cmd_dashboard(cli.format, &cli.api_url).await,
        Commands::Status => cmd_status(cli.format, &cli.api_url).await,
        Commands::Test => cmd_test(cli.format, &cli.api_url).await,
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("io", "klaxon", "klaxon") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn severity_colored(severity: &str) -> colored::ColoredString {
    match severity {
        "CRITICAL" => severity.red().bold(),
        "HIGH" => severity.yellow(),
        "MEDIUM" => severity.cyan(),
        _ => severity.white(),
    }
}

async fn cmd_serve(
    serve_config: ServeConfig,
    app_config: AppConfig,
    validate_only: bool,
) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    // Run configuration validation
    let validation_result = ConfigValidator::validate(&app_config);
    validation_result.print();

    // If validate_only mode, exit after validation
    if validate_only {
        if validation_result.has_errors() {
            println!();
            println!(
                "{}",
                "Configuration validation failed. Fix the errors above before starting the server."
                    .red()
                    .bold()
            );
            std::process::exit(1);
        } else {
            println!();
            println!(
                "{}",
                "Configuration is valid. Server can be started."
                    .green()
                    .bold()
            );
            return Ok(());
        }
    }

    // If there are errors, refuse to start
    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Server startup aborted due to configuration errors. Fix the errors above and try again."
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    println!();
    run_server(serve_config, app_config).await
}

async fn cmd_validate(config_path: PathBuf) -> Result<()> {
    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );

    // First, check if the file can be loaded
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Run comprehensive validation
    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    // Summary
    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Score floor: {}", config.pipeline.min_anomaly_score);
    println!(
        "  Thresholds: {} / {} / {} / {}",
        config.classifier.critical_threshold,
        config.classifier.high_threshold,
        config.classifier.medium_threshold,
        config.classifier.low_threshold
    );
    println!(
        "  Suppression window: {}s",
        config.gate.suppression_window_secs
    );
    println!(
        "  Rate limit: {} alerts/service",
        config.gate.max_alerts_per_service
    );
    println!("  Retention: {} days", config.incidents.retention_days);
    println!("  API: {}:{}", config.api.host, config.api.port);

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

async fn cmd_config(config: AppConfig, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────");
        print!("{}", serde_yaml::to_string(&config)?);
    }

    Ok(())
}

async fn cmd_init(config_path: PathBuf, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "{}: {} already exists (use --force to overwrite)",
            "Error".red(),
            config_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    AppConfig::default().save(&config_path)?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        config_path.display().to_string().cyan()
    );

    Ok(())
}

async fn cmd_incident(action: IncidentCommands, format: OutputFormat, api_url: &str) -> Result<()> {
    let client = ApiClient::new(api_url)?;

    match action {
        IncidentCommands::List {
            service,
            status,
            severity,
            limit,
        } => {
            let params = ListIncidentsParams {
                service,
                status,
                severity,
                per_page: Some(limit as u32),
                ..Default::default()
            };

            match client.list_incidents(&params).await {
                Ok(response) => {
                    if format == OutputFormat::Json {
                        println!("{}", serde_json::to_string_pretty(&response)?);
                    } else {
                        println!("{}", "Incidents".bold());
                        println!("─────────");
                        if response.data.is_empty() {
                            println!("No incidents found");
                        } else {
                            for incident in response.data {
                                println!(
                                    "  {} [{}] {} {} - {}",
                                    incident.id.to_string()[..8].cyan(),
                                    severity_colored(&incident.severity),
                                    incident.status,
                                    incident.service_name,
                                    incident.title
                                );
                            }
                            println!();
                            println!(
                                "Page {}/{} ({} total)",
                                response.pagination.page,
                                response.pagination.total_pages,
                                response.pagination.total_items
                            );
                        }
                    }
                }
                Err(e) => {
                    println!("{}: {}", "Error".red(), e);
                    println!("Make sure the API server is running (klaxon serve)");
                }
            }
        }
        IncidentCommands::Show { id } => match uuid::Uuid::parse_str(&id) {
            Ok(uuid) => match client.get_incident(uuid).await {
                Ok(incident) => {
                    if format == OutputFormat::Json {
                        println!("{}", serde_json::to_string_pretty(&incident)?);
                    } else {
                        print_incident_detail(&incident);
                    }
                }
                Err(e) => {
                    println!("{}: {}", "Error".red(), e);
                }
            },
            Err(_) => {
                println!("{}: Invalid UUID format", "Error".red());
            }
        },
        IncidentCommands::Comment { id, message, user } => match uuid::Uuid::parse_str(&id) {
            Ok(uuid) => {
                let body = CommentBody {
                    comment: message,
                    user_id: user,
                };
                match client.add_comment(uuid, &body).await {
                    Ok(incident) => {
                        println!(
                            "{} Comment added to {} ({} events)",
                            "✓".green(),
                            incident.incident.id.to_string()[..8].cyan(),
                            incident.events.len()
                        );
                    }
                    Err(e) => {
                        println!("{}: {}", "Error".red(), e);
                    }
                }
            }
            Err(_) => {
                println!("{}: Invalid UUID format", "Error".red());
            }
        },
    }
    Ok(())
}

fn print_incident_detail(incident: &api_client::IncidentDetail) {
    println!("{} {}", "Incident:".bold(), incident.incident.id);
    println!("─────────────────────────────────────────");
    println!("  {} {}", "Status:".cyan(), incident.incident.status);
    println!(
        "  {} {}",
        "Severity:".cyan(),
        severity_colored(&incident.incident.severity)
    );
    println!("  {} {}", "Service:".cyan(), incident.incident.service_name);
    println!("  {} {}", "Host:".cyan(), incident.incident.hostname);
    println!("  {} {}", "Title:".cyan(), incident.incident.title);
    println!(
        "  {} {} (score {:.2})",
        "Anomaly:".cyan(),
        incident.incident.anomaly_type,
        incident.incident.anomaly_score
    );
    println!(
        "  {} {} (escalation level {})",
        "Impact:".cyan(),
        incident.incident.impact_score,
        incident.incident.escalation_level
    );
    println!("  {} {}", "Alert ID:".cyan(), incident.incident.alert_id);
    println!("  {} {}", "Fingerprint:".cyan(), incident.fingerprint);
    if let Some(assigned) = &incident.incident.assigned_to {
        println!("  {} {}", "Assigned:".cyan(), assigned);
    }
    if !incident.incident.tags.is_empty() {
        println!(
            "  {} {}",
            "Tags:".cyan(),
            incident.incident.tags.join(", ")
        );
    }
    println!("  {} {}", "Created:".cyan(), incident.incident.created_at);
    println!("  {} {}", "Updated:".cyan(), incident.incident.updated_at);
    if let Some(resolved) = incident.incident.resolved_at {
        println!("  {} {}", "Resolved:".cyan(), resolved);
    }
    println!("  {} {}", "Expires:".cyan(), incident.expires_at);

    if !incident.description.is_empty() {
        println!();
        println!("{}", "Description".bold());
        println!("  {}", incident.description);
    }

    if !incident.affected_services.is_empty() {
        println!();
        println!("{}", "Affected Services".bold());
        for service in &incident.affected_services {
            println!("  - {}", service);
        }
    }

    if let Some(resolution) = &incident.resolution {
        println!();
        println!("{} {}", "Resolution:".bold(), resolution);
    }
    if let Some(root_cause) = &incident.root_cause {
        println!("{} {}", "Root Cause:".bold(), root_cause);
    }

    println!();
    println!("{} ({})", "Event Log".bold(), incident.events.len());
    for entry in &incident.events {
        println!(
            "  {} {} by {} - {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.event_type,
            entry.user_id,
            entry.description
        );
    }
}

async fn cmd_dashboard(format: OutputFormat, api_url: &str) -> Result<()> {
    let client = ApiClient::new(api_url)?;

    match client.dashboard_summary().await {
        Ok(summary) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", "Klaxon Dashboard".bold());
                println!("────────────────");
                println!();
                println!("  Total alerts: {}", summary.total_alerts);
                println!("  Critical alerts: {}", summary.critical_alerts);

                let health = format!("{:.1}", summary.system_health_score);
                let health_colored = if summary.system_health_score >= 80.0 {
                    health.green()
                } else if summary.system_health_score >= 50.0 {
                    health.yellow()
                } else {
                    health.red()
                };
                println!("  System health: {}", health_colored);

                if !summary.top_services.is_empty() {
                    println!();
                    println!("{}", "Top Services".bold());
                    for entry in &summary.top_services {
                        println!("  {}: {}", entry.service, entry.count);
                    }
                }

                if !summary.recent_alerts.is_empty() {
                    println!();
                    println!("{}", "Recent Alerts".bold());
                    for alert in &summary.recent_alerts {
                        println!(
                            "  {} [{}] {} - {}",
                            alert.created_at.format("%H:%M:%S"),
                            severity_colored(&alert.severity),
                            alert.service_name,
                            alert.title
                        );
                    }
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure the API server is running (klaxon serve)");
        }
    }
    Ok(())
}

async fn cmd_status(format: OutputFormat, api_url: &str) -> Result<()> {
    let client = ApiClient::new(api_url)?;

    match client.health().await {
        Ok(health) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("{}", "Klaxon Status".bold());
                println!("─────────────");
                let status_colored = match health.status.as_str() {
                    "healthy" => health.status.green(),
                    "degraded" => health.status.yellow(),
                    _ => health.status.red(),
                };
                println!("  Status: {}", status_colored);
                println!("  Version: {}", health.version);
                println!("  Uptime: {}s", health.uptime_seconds);
                println!();
                println!("{}", "Queue".bold());
                println!("  Connected: {}", health.queue.connected);
                println!("  Pending messages: {}", health.queue.pending_messages);
                println!("  Consumers: {}", health.queue.consumer_count);

                if let Ok(stats) = client.gate_stats().await {
                    println!();
                    println!("{}", "Gate".bold());
                    println!("  Suppression entries: {}", stats.suppression_entries);
                    println!("  Tracked services: {}", stats.tracked_services);
                    println!("  Counted alerts: {}", stats.counted_alerts);
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure the API server is running (klaxon serve)");
        }
    }
    Ok(())
}

async fn cmd_test(format: OutputFormat, api_url: &str) -> Result<()> {
    println!("{}", "Publishing Test Alert".bold());
    println!("─────────────────────");

    let client = ApiClient::new(api_url)?;

    match client.test_alert().await {
        Ok(accepted) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&accepted)?);
            } else {
                println!("{}", "Alert accepted".green());
                println!("  ID: {}", accepted.alert.alert_id);
                println!("  Service: {}", accepted.alert.service_name);
                println!(
                    "  Severity: {}",
                    severity_colored(&accepted.alert.severity)
                );
                println!("  Score: {}", accepted.alert.anomaly_score);
            }
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure the API server is running (klaxon serve)");
        }
    }
    Ok(())
}
