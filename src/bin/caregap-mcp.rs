//! Care-gap MCP server - main binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caregap_mcp::config::{IntegrationsConfig, ServerConfig, ServerKind, TransportKind};
#[cfg(feature = "http-transport")]
use caregap_mcp::transport::HttpTransport;
use caregap_mcp::transport::{MessageHandler, StdioTransport, Transport};
use caregap_mcp::{SessionState, ToolServer};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "caregap-mcp")]
#[command(about = "Care-gap Model Context Protocol tool server")]
#[command(version)]
struct Cli {
    /// Tool catalogue to serve: messaging, transform or data
    #[arg(long, env = "CAREGAP_SERVER")]
    server: ServerKind,

    /// Transport mode: stdio or http
    #[arg(long, default_value = "stdio")]
    transport: TransportKind,

    /// Host to bind to for HTTP transport
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind to for HTTP transport
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Deadline in seconds for each live backend call (0 disables)
    #[arg(long)]
    adapter_timeout_secs: Option<u64>,

    /// Load integration credentials from this file instead of `.env`
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            server: self.server,
            transport: self.transport,
            host: self.host.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
            adapter_timeout_secs: self.adapter_timeout_secs,
        }
    }
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    match config.transport {
        // stdout carries the protocol, so logs go to stderr
        TransportKind::Stdio => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
        TransportKind::Http => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .init(),
    }
}

async fn run(transport: &dyn Transport, handler: Arc<dyn MessageHandler>, label: &str) {
    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };

    tokio::select! {
        result = transport.start(handler) => {
            match result {
                Ok(()) => info!("{} transport completed successfully", label),
                Err(e) => error!("{} transport error: {:#}", label, e),
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, stopping {} transport", label);
            if let Err(e) = transport.shutdown().await {
                error!("Error during {} transport shutdown: {:#}", label, e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("Failed to load {}", path.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let config = cli.server_config();
    init_tracing(&config);

    info!(
        "Starting {} MCP server v{} ({})",
        config.server.server_name(),
        caregap_mcp::VERSION,
        config.server
    );

    let integrations = IntegrationsConfig::from_env();
    let server = ToolServer::build(
        config.server,
        &integrations,
        SessionState::new(),
        config.adapter_timeout(),
    )?;
    let handler: Arc<dyn MessageHandler> = Arc::new(server);

    match config.transport {
        TransportKind::Stdio => {
            info!("Starting stdio transport for MCP client integration");
            run(&StdioTransport::new(), handler, "stdio").await;
        }
        #[cfg(feature = "http-transport")]
        TransportKind::Http => {
            info!("Starting HTTP transport on {}:{}", config.host, config.port);
            run(&HttpTransport::new(config.host.clone(), config.port), handler, "HTTP").await;
        }
        #[cfg(not(feature = "http-transport"))]
        TransportKind::Http => {
            anyhow::bail!("HTTP transport requires the `http-transport` feature");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
