//! Harbor API - Main Entry Point
//!
//! Streaming chat turn pipeline: session resolution, entitlement gating,
//! tool-capable generation, and resumable SSE delivery.

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use harbor_api::config::AppConfig;
use harbor_api::server::create_app;

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "harbor-api")]
#[command(about = "Harbor API - Streaming chat turn pipeline")]
#[command(version)]
struct Args {
    /// Host to bind to.
    #[arg(long, env = "HARBOR_API_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "HARBOR_API_PORT")]
    port: Option<u16>,

    /// Log level. Falls back to the configured `logging.level`.
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, config.logging.json);

    tracing::info!("Starting Harbor API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded");

    let addr = config.server.bind_address();
    let app = create_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Initialize tracing/logging.
///
/// Precedence for the filter: `RUST_LOG`/`--log-level`, then the
/// configured `logging.level`. `logging.json` switches the formatter.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
