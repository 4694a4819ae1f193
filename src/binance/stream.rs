// =============================================================================
// Binance kline WebSocket stream
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::client::parse_str_f64;
use crate::market_data::Candle;
use crate::types::Timeframe;

/// One kline update as received from the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineEvent {
    pub symbol: String,
    pub interval: String,
    pub candle: Candle,
}

/// Build the combined-stream URL for `symbols` on one interval.
pub fn build_combined_url(ws_base_url: &str, symbols: &[String], timeframe: Timeframe) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@kline_{}", s.to_lowercase(), timeframe))
        .collect();
    format!(
        "{}/stream?streams={}",
        ws_base_url.trim_end_matches('/'),
        streams.join("/")
    )
}

/// Split the universe into per-connection groups.
pub fn chunk_symbols(symbols: &[String], per_connection: usize) -> Vec<Vec<String>> {
    symbols
        .chunks(per_connection.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Exponential reconnect delay: `base * 2^attempt`, the exponent capped at
/// `max_attempts`.
pub fn backoff_delay(base_ms: u64, attempt: u32, max_attempts: u32) -> Duration {
    let exp = attempt.min(max_attempts).min(16);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
}

/// Parse a kline message.  Both the combined-stream envelope
/// (`{"stream": ..., "data": {...}}`) and the bare single-stream payload are
/// accepted.
pub fn parse_kline_message(text: &str) -> Result<KlineEvent> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let symbol = data["s"]
        .as_str()
        .context("missing field s")?
        .to_uppercase();

    let k = &data["k"];

    let interval = k["i"]
        .as_str()
        .context("missing field k.i")?
        .to_string();

    let candle = Candle {
        open_time: k["t"].as_i64().context("missing field k.t")?,
        close_time: k["T"].as_i64().context("missing field k.T")?,
        open: parse_str_f64(&k["o"], "k.o")?,
        high: parse_str_f64(&k["h"], "k.h")?,
        low: parse_str_f64(&k["l"], "k.l")?,
        close: parse_str_f64(&k["c"], "k.c")?,
        volume: parse_str_f64(&k["v"], "k.v")?,
        quote_volume: parse_str_f64(&k["q"], "k.q")?,
        is_closed: k["x"].as_bool().context("missing field k.x")?,
    };

    Ok(KlineEvent {
        symbol,
        interval,
        candle,
    })
}

/// Connect to `url` and hand every closed kline to `on_closed`.
///
/// Runs until the stream disconnects or an error occurs, then returns so that
/// the caller can handle reconnection.  `on_connected` fires once the
/// handshake succeeds.
pub async fn run_kline_stream<C, F>(url: &str, on_connected: C, mut on_closed: F) -> Result<()>
where
    C: FnOnce(),
    F: FnMut(KlineEvent),
{
    info!(url = %url, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(url)
        .await
        .context("failed to connect to kline WebSocket")?;

    info!(url = %url, "kline WebSocket connected");
    on_connected();
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match parse_kline_message(&text) {
                Ok(event) if event.candle.is_closed => {
                    debug!(
                        symbol = %event.symbol,
                        interval = %event.interval,
                        close = event.candle.close,
                        "closed kline"
                    );
                    on_closed(event);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to parse kline message"),
            },
            // tungstenite answers pings itself.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "kline WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!(url = %url, "kline WebSocket stream ended");
                return Ok(());
            }
        }
    }
}
