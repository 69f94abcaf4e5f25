// =============================================================================
// Phase Index — Main Entry Point
// =============================================================================
//
// Serves the market phase ranking over HTTP.  Each `/api/index-data` request
// runs one refresh cycle; setting `refresh_interval_secs` additionally keeps
// a background loop publishing snapshots for `/api/index-data/latest`.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod coingecko;
mod indicators;
mod market_data;
mod orchestrator;
mod runtime_config;
mod scoring;
mod state_store;
mod types;
mod universe;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::RateLimitTracker;
use crate::market_data::ReqwestTransport;
use crate::runtime_config::RuntimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Phase Index — Starting Up                         ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("PHASE_CONFIG").unwrap_or_else(|_| "runtime_config.json".into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();
    config.validate()?;

    info!(
        bind_addr = %config.bind_addr,
        quote_asset = %config.quote_asset,
        fast_interval = %config.fast_interval,
        batch_size = config.batch_size,
        cors_relay = config.retry.cors_relay.is_some(),
        "Engine configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let rate_limit = Arc::new(RateLimitTracker::new());
    let transport = Arc::new(ReqwestTransport::new(
        config.request_timeout(),
        rate_limit.clone(),
    )?);
    let refresh_secs = config.refresh_interval_secs;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, transport, rate_limit));

    // ── 3. Background refresh loop (optional) ────────────────────────────
    if refresh_secs > 0 {
        let loop_state = state.clone();
        tokio::spawn(async move {
            info!(every_secs = refresh_secs, "Background refresh loop starting");
            let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = loop_state.refresh().await {
                    error!(error = %e, "Background refresh failed — retrying next tick");
                }
            }
        });
    }

    // ── 4. Start the API server ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    let api_state = state.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    info!(
        tracked_symbols = state.store.tracked_symbols(),
        alerts = state.store.alerts().len(),
        "Phase Index shut down complete."
    );
    Ok(())
}
