// =============================================================================
// Binance Module
// =============================================================================
//
// - Public REST endpoints: exchange info, klines, 24h tickers
// - Kline WebSocket stream parsing and connection loop

pub mod client;
pub mod stream;

pub use client::{BinanceClient, SymbolInfo, Ticker24h};
pub use stream::KlineEvent;
