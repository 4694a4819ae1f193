// =============================================================================
// Crosswatch — Main Entry Point
// =============================================================================
//
// Boot order: config -> engine -> universe -> API server -> feed supervisor.
// The selected timeframe is written back to the config file on shutdown.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crosswatch::api::{self, ApiState};
use crosswatch::binance::BinanceClient;
use crosswatch::engine::SignalEngine;
use crosswatch::feed::{self, FeedSettings};
use crosswatch::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Crosswatch starting up");

    let mut config = RuntimeConfig::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    let mut persisted = config.clone();
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    info!(
        timeframe = %config.timeframe,
        history_capacity = config.history_capacity,
        min_history = config.min_history,
        "Configuration ready"
    );

    // ── 2. Engine ────────────────────────────────────────────────────────
    let engine = Arc::new(SignalEngine::new(config.engine_settings(), config.timeframe));
    let (timeframe_tx, timeframe_rx) = watch::channel(config.timeframe);

    // ── 3. Universe ──────────────────────────────────────────────────────
    let client = BinanceClient::new(&config.rest_base_url)?;
    let symbols = feed::resolve_universe(&client, &config).await?;
    if symbols.is_empty() {
        anyhow::bail!("no symbols to watch");
    }
    info!(count = symbols.len(), "Watching symbols");

    // ── 4. API server ────────────────────────────────────────────────────
    let api_state = Arc::new(ApiState {
        engine: engine.clone(),
        timeframe_tx,
        freshness_window_ms: config.freshness_window_ms,
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api::router(api_state)).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Feed ──────────────────────────────────────────────────────────
    let settings = FeedSettings::from(&config);

    tokio::spawn(feed::run_ticker_refresh(
        client.clone(),
        engine.clone(),
        symbols.clone(),
        settings.ticker_refresh,
    ));

    tokio::spawn(feed::run_supervisor(
        client,
        engine.clone(),
        symbols,
        settings,
        timeframe_rx,
    ));

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    persisted.timeframe = engine.timeframe();
    if let Err(e) = persisted.save(DEFAULT_CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Crosswatch shut down complete.");
    Ok(())
}
