//! Edge Relay binary.
//!
//! Loads the TOML configuration, connects the MQTT message client and runs a
//! [`RelayEngine`] until Ctrl-C or SIGTERM. Exit status is non-zero when the
//! configuration is invalid or in-flight messages did not drain within the
//! shutdown grace period.

use clap::Parser;
use edge_relay::client::{MessageClient, MqttMessageClient};
use edge_relay::config;
use edge_relay::core::ControlMessage;
use edge_relay::handlers::status::list_status_providers;
use edge_relay::logging;
use edge_relay::relay::RelayEngine;

use std::sync::Arc;
use tokio::sync::broadcast;

/// Edge Relay - bridges device commands and sensor readings over MQTT
#[derive(Parser)]
#[command(name = "edge-relay")]
#[command(version = "0.1.0")]
#[command(about = "Edge Relay: answers device status commands and raises sensor threshold alerts")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "./config/config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    check: bool,

    /// List available status provider types
    #[arg(short = 'L', long)]
    list_providers: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging with specified level
    logging::init_logging(&cli.log_level);

    // Handle list providers command
    if cli.list_providers {
        println!("Available status providers:");
        for provider in list_status_providers() {
            println!("  - {}", provider);
        }
        return;
    }

    // Load configuration from specified file (environment overrides applied)
    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load config from '{}': {:#}", cli.config, e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config::validate_config(&config) {
        tracing::error!("Configuration error: {e}");
        std::process::exit(1);
    }

    tracing::info!("Configuration loaded and validated successfully.");

    // Dry run stops here
    if cli.check {
        return;
    }

    // Connect the MQTT client; the connection itself is retried in the background
    let client = match MqttMessageClient::connect(&config.mqtt) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to create MQTT client: {:#}", e);
            std::process::exit(1);
        }
    };

    // Build the relay and subscribe every configured route
    let engine = match RelayEngine::from_config(&config, client.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error_kind = e.kind(), "Failed to build relay: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.start(&config.subscriptions).await {
        tracing::error!(error_kind = e.kind(), "Failed to start relay: {e}");
        let _ = client.disconnect().await;
        std::process::exit(1);
    }

    // Ctrl-C or SIGTERM triggers a graceful shutdown
    let (control, control_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = control.send(ControlMessage::Terminate);
    });

    // Relay until terminated, then drain in-flight messages
    let drained = engine.run(control_rx).await;

    if let Err(e) = client.disconnect().await {
        tracing::warn!("MQTT client disconnect failed: {e}");
    }

    if !drained {
        std::process::exit(1);
    }
    tracing::info!("Relay stopped.");
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C"),
        _ = terminate.recv() => tracing::info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received Ctrl-C");
}
