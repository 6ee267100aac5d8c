// =============================================================================
// Stock Insight - Main Entry Point
// =============================================================================
//
// Loads configuration, builds the market-data provider and serves the REST
// API until Ctrl+C. Every analysis runs per request; there are no background
// loops.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod error;
mod forecast;
mod indicators;
mod market_data;
mod pipeline;
mod runtime_config;
mod summary;
mod tools;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::YahooClient;
use crate::runtime_config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "stock_insight.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Stock Insight starting up");

    let config_path =
        std::env::var("STOCK_INSIGHT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Ok(addr) = std::env::var("STOCK_INSIGHT_BIND_ADDR") {
        config.bind_addr = addr;
    }

    info!(
        provider = %config.provider.base_url,
        history_start = %config.provider.history_start,
        default_years = config.analysis.default_forecast_years,
        seasonality = ?config.analysis.forecast.seasonality_mode,
        "Analysis settings"
    );

    // ── 2. Provider & shared state ───────────────────────────────────────
    let provider = YahooClient::new(&config.provider)?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(provider)));

    // ── 3. API server ────────────────────────────────────────────────────
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("Stock Insight shut down complete.");
    Ok(())
}
