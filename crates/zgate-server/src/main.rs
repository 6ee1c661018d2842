//! zgate server - HTTP front end for pty-driven game sessions.

use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use zgate_server::{config, logging, routes, state};

use logging::{LogConfig, LogFormat, LogOverride, Verbosity};

/// zgate server - play interpreter games over stateless HTTP requests.
#[derive(Parser, Debug)]
#[command(name = "zgate-server")]
#[command(about = "HTTP server that drives a text-adventure interpreter per request")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override bind address from config
    #[arg(long)]
    host: Option<String>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level, process lifecycle stays at INFO)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "protocol=debug" or "session=trace")
    /// Repeatable or comma-separated. Targets are prefixed with "zgate::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", value_delimiter = ',')]
    log_overrides: Vec<LogOverride>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        verbosity: Verbosity::from_flags(cli.quiet, cli.verbose, cli.debug, cli.trace),
        overrides: cli.log_overrides,
        format: cli.log_format,
    };
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }

    tracing::info!(
        target: "zgate::startup",
        "Loaded configuration (port: {}, interpreter: {}, saves: {})",
        config.port,
        config.interpreter.binary.display(),
        config.saves_dir.display()
    );

    let state = Arc::new(AppState::new(config.clone())?);
    tracing::info!(
        target: "zgate::startup",
        "Opened profile store at {}",
        config.db_path.display()
    );

    let app = Router::new()
        .merge(routes::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "zgate::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
