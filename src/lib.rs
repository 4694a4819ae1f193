// =============================================================================
// Crosswatch — EMA cross signal scanner
// =============================================================================
//
// Closed candles flow one way: feed -> CandleSeries -> IndicatorPipeline ->
// SignalClassifier -> published InstrumentView -> ranking / REST.
// =============================================================================

pub mod api;
pub mod binance;
pub mod engine;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod market_data;
pub mod ranking;
pub mod runtime_config;
pub mod signals;
pub mod types;
pub mod universe;
