// ==============================================================================
// main.rs - Annotation Report Gateway Entry Point
// ==============================================================================
// Description: Axum web server that takes annotation uploads and returns the
//              pipeline's report for download
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use annotation_report_gateway::{build_router, config::Config, state::AppState};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "annotation_report_gateway=info,tower_http=info".into());
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    info!("Starting Annotation Report Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Initialize application state
    let state = AppState::new(&config)
        .await
        .context("Failed to initialize application state")?;

    info!(
        "Uploads in {:?}, reports published to {:?}, pipeline {:?}",
        state.upload_dir(),
        state.public_results_dir(),
        state.pipeline().entry_point()
    );

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("Failed to bind to address")?;

    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
