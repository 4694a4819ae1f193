// =============================================================================
// Market feed — backfill, live klines and 24h stats into the engine
// =============================================================================
//
// The supervisor owns one timeframe generation at a time:
//   1. backfill every symbol in batches (REST klines),
//   2. refresh 24h market stats,
//   3. open one combined kline stream per chunk of symbols, plus a reseed
//      worker and the periodic history refresh,
//   4. wait for a timeframe change, abort the generation and start over.
//
// Only closed candles on the engine's current interval ever reach the
// engine.  A live candle that skips intervals, and every symbol of a stream
// that reconnects, is handed to the reseed worker so the history is fetched
// again instead of being computed across a hole.  Per-symbol failures are
// logged and skipped.
// =============================================================================

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::binance::stream::{backoff_delay, build_combined_url, chunk_symbols, run_kline_stream};
use crate::binance::{BinanceClient, KlineEvent};
use crate::engine::SignalEngine;
use crate::error::CandleRejected;
use crate::market_data::Candle;
use crate::runtime_config::RuntimeConfig;
use crate::types::Timeframe;
use crate::universe::select_symbols;

/// Feed pacing, copied out of `RuntimeConfig` at startup.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub ws_base_url: String,
    pub backfill_limit: u32,
    pub backfill_batch_size: usize,
    pub backfill_batch_delay: Duration,
    pub streams_per_connection: usize,
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub ticker_refresh: Duration,
    /// `None` disables the periodic full history refresh.
    pub history_refresh: Option<Duration>,
}

impl From<&RuntimeConfig> for FeedSettings {
    fn from(cfg: &RuntimeConfig) -> Self {
        Self {
            ws_base_url: cfg.ws_base_url.clone(),
            backfill_limit: cfg.backfill_limit,
            backfill_batch_size: cfg.backfill_batch_size,
            backfill_batch_delay: Duration::from_millis(cfg.backfill_batch_delay_ms),
            streams_per_connection: cfg.streams_per_connection,
            reconnect_base_delay_ms: cfg.reconnect_base_delay_ms,
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            ticker_refresh: Duration::from_secs(cfg.ticker_refresh_secs.max(1)),
            history_refresh: (cfg.history_refresh_secs > 0)
                .then(|| Duration::from_secs(cfg.history_refresh_secs)),
        }
    }
}

// =============================================================================
// Universe
// =============================================================================

/// Configured symbols if any, otherwise every eligible symbol listed by the
/// exchange.
pub async fn resolve_universe(client: &BinanceClient, cfg: &RuntimeConfig) -> Result<Vec<String>> {
    if !cfg.symbols.is_empty() {
        let mut symbols: Vec<String> = cfg.symbols.iter().map(|s| s.to_uppercase()).collect();
        symbols.sort();
        symbols.dedup();
        return Ok(symbols);
    }

    let listed = client
        .get_exchange_symbols()
        .await
        .context("failed to discover symbol universe")?;
    let symbols = select_symbols(&listed, &cfg.quote_asset, &cfg.excluded_symbol_fragments);
    info!(listed = listed.len(), selected = symbols.len(), "symbol universe discovered");
    Ok(symbols)
}

// =============================================================================
// Engine hand-off
// =============================================================================

/// What became of one live kline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineOutcome {
    Accepted,
    /// Wrong interval, duplicate, out of order or malformed.
    Dropped,
    /// The candle skipped intervals; the symbol's history must be refetched.
    NeedsReseed,
}

/// Seed `symbol` with the closed part of a REST backfill.
pub fn seed_from_klines(engine: &SignalEngine, symbol: &str, klines: Vec<Candle>) -> usize {
    let closed: Vec<Candle> = klines.into_iter().filter(|c| c.is_closed).collect();
    match engine.set_historical_seed(symbol, &closed) {
        Ok(view) => view.candles,
        Err(e) => {
            warn!(symbol, error = %e, "historical seed rejected");
            0
        }
    }
}

/// Submit one closed kline if it belongs to the engine's current interval.
pub fn handle_closed_kline(engine: &SignalEngine, event: KlineEvent) -> KlineOutcome {
    let timeframe = engine.timeframe();
    if event.interval != timeframe.as_str() {
        debug!(
            symbol = %event.symbol,
            interval = %event.interval,
            active = %timeframe,
            "dropping kline from inactive interval"
        );
        return KlineOutcome::Dropped;
    }

    match engine.submit_closed_candle(&event.symbol, event.candle) {
        Ok(_) => KlineOutcome::Accepted,
        Err(e @ CandleRejected::Gap { .. }) => {
            info!(symbol = %event.symbol, error = %e, "history gap; reseeding");
            KlineOutcome::NeedsReseed
        }
        Err(e) => {
            debug!(symbol = %event.symbol, error = %e, "candle rejected");
            KlineOutcome::Dropped
        }
    }
}

// =============================================================================
// Backfill
// =============================================================================

/// Fetch and seed history for every symbol, `backfill_batch_size` at a time.
/// Stops early if the timeframe changes underneath it.
pub async fn backfill(
    client: &BinanceClient,
    engine: &SignalEngine,
    symbols: &[String],
    timeframe: Timeframe,
    settings: &FeedSettings,
) {
    let started = std::time::Instant::now();
    let mut seeded = 0usize;
    let mut failed = 0usize;
    let batches: Vec<&[String]> = symbols.chunks(settings.backfill_batch_size.max(1)).collect();

    for (i, batch) in batches.iter().enumerate() {
        let results = join_all(
            batch
                .iter()
                .map(|s| client.get_klines(s, timeframe, settings.backfill_limit)),
        )
        .await;

        if engine.timeframe() != timeframe {
            info!(timeframe = %timeframe, "timeframe changed during backfill; abandoning");
            return;
        }

        for (symbol, result) in batch.iter().zip(results) {
            match result {
                Ok(klines) => {
                    seed_from_klines(engine, symbol, klines);
                    seeded += 1;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "backfill failed");
                    failed += 1;
                }
            }
        }

        if i + 1 < batches.len() {
            tokio::time::sleep(settings.backfill_batch_delay).await;
        }
    }

    info!(
        timeframe = %timeframe,
        seeded,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "backfill complete"
    );
}

/// Take the next reseed request plus everything already queued behind it,
/// deduplicated.  `None` once every sender is gone.
pub async fn next_reseed_batch(rx: &mut mpsc::UnboundedReceiver<String>) -> Option<Vec<String>> {
    let first = rx.recv().await?;
    let mut pending = BTreeSet::from([first]);
    while let Ok(symbol) = rx.try_recv() {
        pending.insert(symbol);
    }
    Some(pending.into_iter().collect())
}

/// Refetch history for symbols whose live feed lost continuity.
async fn run_reseed_worker(
    client: BinanceClient,
    engine: Arc<SignalEngine>,
    timeframe: Timeframe,
    settings: FeedSettings,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(symbols) = next_reseed_batch(&mut rx).await {
        debug!(count = symbols.len(), "reseeding symbols");
        backfill(&client, &engine, &symbols, timeframe, &settings).await;
    }
}

/// Full history refresh on a fixed period, skipping the immediate tick.
async fn run_history_refresh(
    client: BinanceClient,
    engine: Arc<SignalEngine>,
    symbols: Vec<String>,
    timeframe: Timeframe,
    settings: FeedSettings,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        info!(timeframe = %timeframe, "periodic history refresh");
        backfill(&client, &engine, &symbols, timeframe, &settings).await;
    }
}

// =============================================================================
// Market stats
// =============================================================================

pub async fn refresh_market_stats(
    client: &BinanceClient,
    engine: &SignalEngine,
    symbols: &HashSet<String>,
) -> Result<usize> {
    let tickers = client.get_tickers_24h().await?;
    let mut updated = 0;
    for ticker in tickers.iter().filter(|t| symbols.contains(&t.symbol)) {
        match ticker.market_stats() {
            Ok(stats) => {
                engine.update_market_stats(&ticker.symbol, stats);
                updated += 1;
            }
            Err(e) => debug!(symbol = %ticker.symbol, error = %e, "bad ticker entry"),
        }
    }
    debug!(updated, "market stats refreshed");
    Ok(updated)
}

/// Periodic 24h stats refresh.  Runs forever.
pub async fn run_ticker_refresh(
    client: BinanceClient,
    engine: Arc<SignalEngine>,
    symbols: Vec<String>,
    every: Duration,
) {
    let symbols: HashSet<String> = symbols.into_iter().collect();
    let mut ticker = tokio::time::interval(every);
    // The supervisor refreshes once per generation already.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = refresh_market_stats(&client, &engine, &symbols).await {
            warn!(error = %e, "market stats refresh failed");
        }
    }
}

// =============================================================================
// Live streams
// =============================================================================

/// One combined-stream connection with exponential-backoff reconnect.  After
/// a reconnect every symbol of the chunk is queued for a reseed.
async fn run_stream_with_reconnect(
    url: String,
    symbols: Vec<String>,
    engine: Arc<SignalEngine>,
    settings: FeedSettings,
    reseed_tx: mpsc::UnboundedSender<String>,
) {
    let mut attempt: u32 = 0;
    let mut reconnecting = false;
    loop {
        let mut connected = false;
        let result = run_kline_stream(
            &url,
            || {
                connected = true;
                if reconnecting {
                    for symbol in &symbols {
                        let _ = reseed_tx.send(symbol.clone());
                    }
                }
            },
            |event| {
                let symbol = event.symbol.clone();
                if handle_closed_kline(&engine, event) == KlineOutcome::NeedsReseed {
                    let _ = reseed_tx.send(symbol);
                }
            },
        )
        .await;

        if connected {
            attempt = 0;
            reconnecting = true;
        }
        if let Err(e) = result {
            error!(url = %url, error = %e, "kline stream error");
        }

        let delay = backoff_delay(
            settings.reconnect_base_delay_ms,
            attempt,
            settings.max_reconnect_attempts,
        );
        warn!(
            url = %url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting kline stream"
        );
        tokio::time::sleep(delay).await;
        attempt = attempt.saturating_add(1);
    }
}

/// Spawn everything that lives for one timeframe generation.
fn spawn_generation(
    client: &BinanceClient,
    engine: &Arc<SignalEngine>,
    symbols: &[String],
    timeframe: Timeframe,
    settings: &FeedSettings,
) -> Vec<JoinHandle<()>> {
    let (reseed_tx, reseed_rx) = mpsc::unbounded_channel();

    let mut tasks: Vec<JoinHandle<()>> = chunk_symbols(symbols, settings.streams_per_connection)
        .into_iter()
        .map(|chunk| {
            let url = build_combined_url(&settings.ws_base_url, &chunk, timeframe);
            tokio::spawn(run_stream_with_reconnect(
                url,
                chunk,
                engine.clone(),
                settings.clone(),
                reseed_tx.clone(),
            ))
        })
        .collect();

    tasks.push(tokio::spawn(run_reseed_worker(
        client.clone(),
        engine.clone(),
        timeframe,
        settings.clone(),
        reseed_rx,
    )));

    if let Some(every) = settings.history_refresh {
        tasks.push(tokio::spawn(run_history_refresh(
            client.clone(),
            engine.clone(),
            symbols.to_vec(),
            timeframe,
            settings.clone(),
            every,
        )));
    }

    tasks
}

// =============================================================================
// Supervisor
// =============================================================================

/// Drive the engine until the timeframe channel closes.
pub async fn run_supervisor(
    client: BinanceClient,
    engine: Arc<SignalEngine>,
    symbols: Vec<String>,
    settings: FeedSettings,
    mut timeframe_rx: watch::Receiver<Timeframe>,
) {
    let symbol_set: HashSet<String> = symbols.iter().cloned().collect();

    loop {
        let timeframe = engine.timeframe();
        info!(timeframe = %timeframe, symbols = symbols.len(), "feed generation starting");

        backfill(&client, &engine, &symbols, timeframe, &settings).await;
        if let Err(e) = refresh_market_stats(&client, &engine, &symbol_set).await {
            warn!(error = %e, "initial market stats refresh failed");
        }

        let tasks = spawn_generation(&client, &engine, &symbols, timeframe, &settings);
        info!(tasks = tasks.len(), "kline streams started");

        let changed = timeframe_rx.changed().await;
        for handle in &tasks {
            handle.abort();
        }

        if changed.is_err() {
            info!("timeframe channel closed; feed stopping");
            return;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;

    fn candle(i: i64, closed: bool) -> Candle {
        let close = 100.0 + (i as f64 * 0.3).sin();
        Candle {
            open_time: i * 300_000,
            close_time: i * 300_000 + 299_999,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1.0,
            quote_volume: close,
            is_closed: closed,
        }
    }

    fn engine() -> SignalEngine {
        SignalEngine::new(EngineSettings::default(), Timeframe::FiveMinutes)
    }

    fn event(interval: &str, i: i64) -> KlineEvent {
        KlineEvent {
            symbol: "ETHUSDT".to_string(),
            interval: interval.to_string(),
            candle: candle(i, true),
        }
    }

    #[test]
    fn seeding_drops_the_forming_candle() {
        let engine = engine();
        let mut klines: Vec<Candle> = (0..100).map(|i| candle(i, true)).collect();
        klines.push(candle(100, false));
        assert_eq!(seed_from_klines(&engine, "BTCUSDT", klines), 100);
        let view = engine.get_snapshot("BTCUSDT").unwrap();
        assert!(view.classification.is_classified());
    }

    #[test]
    fn klines_on_other_intervals_are_dropped() {
        let engine = engine();

        assert_eq!(handle_closed_kline(&engine, event("1m", 0)), KlineOutcome::Dropped);
        assert!(engine.get_snapshot("ETHUSDT").is_none());

        assert_eq!(handle_closed_kline(&engine, event("5m", 0)), KlineOutcome::Accepted);
        assert_eq!(handle_closed_kline(&engine, event("5m", 0)), KlineOutcome::Dropped);
        assert_eq!(handle_closed_kline(&engine, event("5m", 1)), KlineOutcome::Accepted);
        assert_eq!(engine.get_snapshot("ETHUSDT").unwrap().candles, 2);
    }

    #[test]
    fn live_gap_asks_for_reseed_and_reseed_restores_continuity() {
        let engine = engine();
        let history: Vec<Candle> = (0..60).map(|i| candle(i, true)).collect();
        seed_from_klines(&engine, "ETHUSDT", history);

        assert_eq!(handle_closed_kline(&engine, event("5m", 70)), KlineOutcome::NeedsReseed);
        assert_eq!(engine.get_snapshot("ETHUSDT").unwrap().candles, 60);

        // The REST refetch covers the hole, then the stream carries on.
        let refetched: Vec<Candle> = (0..71).map(|i| candle(i, true)).collect();
        seed_from_klines(&engine, "ETHUSDT", refetched);
        assert_eq!(handle_closed_kline(&engine, event("5m", 71)), KlineOutcome::Accepted);
        assert_eq!(engine.get_snapshot("ETHUSDT").unwrap().candles, 72);
    }

    #[tokio::test]
    async fn reseed_requests_are_batched_and_deduplicated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for symbol in ["ETHUSDT", "BTCUSDT", "ETHUSDT"] {
            tx.send(symbol.to_string()).unwrap();
        }
        assert_eq!(
            next_reseed_batch(&mut rx).await,
            Some(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        );

        tx.send("SOLUSDT".to_string()).unwrap();
        drop(tx);
        assert_eq!(next_reseed_batch(&mut rx).await, Some(vec!["SOLUSDT".to_string()]));
        assert_eq!(next_reseed_batch(&mut rx).await, None);
    }

    #[test]
    fn settings_follow_config() {
        let mut cfg = RuntimeConfig::default();
        let settings = FeedSettings::from(&cfg);
        assert_eq!(settings.backfill_batch_delay, Duration::from_millis(100));
        assert_eq!(settings.ticker_refresh, Duration::from_secs(300));
        assert_eq!(settings.history_refresh, Some(Duration::from_secs(300)));
        assert_eq!(settings.streams_per_connection, 10);

        cfg.history_refresh_secs = 0;
        assert_eq!(FeedSettings::from(&cfg).history_refresh, None);
    }
}
