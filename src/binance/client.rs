// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unauthenticated endpoints are used: exchange info for the instrument
// universe, klines for the historical backfill and the 24h ticker for market
// statistics.  Binance sends decimal values as JSON strings; they are parsed
// here so nothing downstream sees raw text.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::market_data::Candle;
use crate::types::{MarketStats, Timeframe};

/// Hard upper bound Binance accepts for `limit` on /api/v3/klines.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// =============================================================================
// Wire types
// =============================================================================

/// One entry of /api/v3/exchangeInfo `symbols`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

/// One entry of /api/v3/ticker/24hr.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub price_change: String,
    pub price_change_percent: String,
    pub volume: String,
    pub quote_volume: String,
    #[serde(default)]
    pub count: u64,
}

impl Ticker24h {
    pub fn market_stats(&self) -> Result<MarketStats> {
        Ok(MarketStats {
            price_change: parse_decimal(&self.price_change, "priceChange")?,
            price_change_percent: parse_decimal(&self.price_change_percent, "priceChangePercent")?,
            volume: parse_decimal(&self.volume, "volume")?,
            quote_volume: parse_decimal(&self.quote_volume, "quoteVolume")?,
            trade_count: self.count,
        })
    }
}

fn parse_decimal(s: &str, name: &str) -> Result<f64> {
    s.parse::<f64>()
        .with_context(|| format!("failed to parse {name} as f64: {s}"))
}

// =============================================================================
// Client
// =============================================================================

/// Binance public REST client.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance GET {path} returned {status}: {body}");
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("failed to parse {path} response"))
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET /api/v3/exchangeInfo — every listed symbol.
    #[instrument(skip(self), name = "binance::get_exchange_symbols")]
    pub async fn get_exchange_symbols(&self) -> Result<Vec<SymbolInfo>> {
        let info: ExchangeInfo = self.get_json("/api/v3/exchangeInfo", "").await?;
        debug!(count = info.symbols.len(), "exchange info fetched");
        Ok(info.symbols)
    }

    /// GET /api/v3/klines, oldest-first.  A kline counts as closed once its
    /// close time is in the past.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);
        let query = format!("symbol={symbol}&interval={interval}&limit={limit}");
        let rows: Vec<Vec<serde_json::Value>> = self.get_json("/api/v3/klines", &query).await?;

        let now_ms = Utc::now().timestamp_millis();
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row, now_ms) {
                Ok(c) => candles.push(c),
                Err(e) => warn!(symbol, error = %e, "skipping malformed kline entry"),
            }
        }

        debug!(symbol, interval = %interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /api/v3/ticker/24hr for every symbol.
    #[instrument(skip(self), name = "binance::get_tickers_24h")]
    pub async fn get_tickers_24h(&self) -> Result<Vec<Ticker24h>> {
        let tickers: Vec<Ticker24h> = self.get_json("/api/v3/ticker/24hr", "").await?;
        debug!(count = tickers.len(), "24h tickers fetched");
        Ok(tickers)
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Parse a JSON value that may be either a string or a number into `f64`.
pub(crate) fn parse_str_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

/// Convert one REST kline row into a `Candle`.
pub fn parse_kline_row(row: &[serde_json::Value], now_ms: i64) -> Result<Candle> {
    if row.len() < 8 {
        anyhow::bail!("kline entry has {} elements, expected at least 8", row.len());
    }

    let open_time = row[0].as_i64().context("kline openTime is not an integer")?;
    let close_time = row[6].as_i64().context("kline closeTime is not an integer")?;

    Ok(Candle {
        open_time,
        close_time,
        open: parse_str_f64(&row[1], "open")?,
        high: parse_str_f64(&row[2], "high")?,
        low: parse_str_f64(&row[3], "low")?,
        close: parse_str_f64(&row[4], "close")?,
        volume: parse_str_f64(&row[5], "volume")?,
        quote_volume: parse_str_f64(&row[7], "quoteVolume")?,
        is_closed: close_time < now_ms,
    })
}
