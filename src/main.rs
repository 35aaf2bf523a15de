//! Animals - a deliberately slow farm API
//!
//! Serves animal sounds from Redis over HTTP, with Basic-auth protected,
//! admin-only writes and a per-user credential store.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use animals::{create_router, lifecycle, AppState, Config};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "animals", version, about = "A simple and slow API for teaching async I/O")]
struct Cli {
    /// Specify config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Main entry point for the farm API server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from the optional file and environment
/// 3. Dial the backend pool and seed the bootstrap user
/// 4. Serve HTTP until SIGINT/SIGTERM
/// 5. Shut the pool down
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "animals=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        lookup_delay_ms = config.server.lookup_delay_ms,
        redis = ?config.redis,
        "configuration loaded"
    );

    let state = AppState::from_config(&config);
    if let Err(err) = lifecycle::on_start(&state, &config.farmer).await {
        lifecycle::on_stop(&state).await;
        return Err(err).context("starting the farm");
    }

    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP");

    lifecycle::on_stop(&state).await;
    info!("Server shutdown complete");
    served
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
