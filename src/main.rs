//! Filter Gateway - CLI Application
//!
//! A minimal HTTP entry gateway with:
//! - Configuration via TOML
//! - Ordered pre-dispatch filters
//! - Method-guarded routes
//! - Prometheus metrics

use clap::{Parser, Subcommand};
use filter_gateway::{app::build_gateway, config::GatewayConfig, gateway::serve_router, logging};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

/// Filter Gateway - A minimal HTTP entry gateway
#[derive(Parser)]
#[command(name = "filter-gateway")]
#[command(version, about = "A minimal HTTP entry gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Validate the configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Generate a sample configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_server(&config).await?,
        Commands::Validate { config } => validate_config(&config)?,
        Commands::Init { output } => generate_sample_config(&output)?,
    }

    Ok(())
}

/// Start the gateway server
async fn start_server(config_path: &str) -> anyhow::Result<()> {
    let config = GatewayConfig::from_file(config_path)?;
    // Held until the server stops so buffered log lines are flushed
    let _log_guard = logging::init(&config.logging)?;
    info!("Loaded configuration from {}", config_path);

    let gateway = match build_gateway(&config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Gateway setup failed: {}", e);
            return Err(e);
        }
    };

    let app = gateway
        .into_router()
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)));

    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_router(listener, app, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

/// Validate configuration file
fn validate_config(config_path: &str) -> anyhow::Result<()> {
    match GatewayConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid!");
            println!();
            println!("Server: {}:{}", config.server.host, config.server.port);
            println!("Timeout: {}s", config.server.timeout);
            println!();
            println!("Pre-filters:");
            if config.request_id.enabled {
                println!(
                    "  [{}] request_id ({})",
                    config.request_id.order, config.request_id.header_name
                );
            }
            if config.access_token.enabled {
                println!(
                    "  [{}] access_token ({}, {} tokens)",
                    config.access_token.order,
                    config.access_token.header_name,
                    config.access_token.tokens.len()
                );
            }
            println!();
            println!("Routes:");
            let health = if config.health.enabled { "✓" } else { "✗" };
            println!("  {} GET {} (health)", health, config.health.path);
            let metrics = if config.metrics.enabled { "✓" } else { "✗" };
            println!("  {} GET {} (metrics)", metrics, config.metrics.path);
            println!();
            println!("Log outputs: {}", config.logging.effective_outputs().len());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

/// Generate sample configuration file
fn generate_sample_config(output_path: &str) -> anyhow::Result<()> {
    let sample_config = r#"# Filter Gateway Configuration

[server]
host = "0.0.0.0"
port = 8080
timeout = 30

[health]
enabled = true
path = "/health"

[metrics]
enabled = true
path = "/metrics"

# Pre-filters run in ascending `order`
[request_id]
enabled = true
header_name = "X-Request-Id"
order = 0

[access_token]
enabled = false
header_name = "Authorization"
tokens = ["change-me"]
order = 10

# Each output writes a level range in one format to one target
[[logging.outputs]]
format = "plain"   # Options: plain, json
target = "stdout"  # Options: stdout, stderr, file
min_level = "info"
max_level = "warn"

[[logging.outputs]]
format = "json"
target = "stderr"
min_level = "error"
max_level = "error"
"#;

    std::fs::write(output_path, sample_config)?;
    println!("Sample configuration written to {}", output_path);
    Ok(())
}
