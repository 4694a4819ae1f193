use serde::{Deserialize, Serialize};

use crate::error::CandleRejected;

/// A single OHLCV candle.  Only candles with `is_closed == true` are allowed
/// into a [`CandleSeries`](super::CandleSeries) through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub is_closed: bool,
}

impl Candle {
    /// Closed-candle guard plus the finite-price contract.  Ordering against
    /// the existing history is checked by the engine, which owns the series.
    pub fn validate(&self) -> Result<(), CandleRejected> {
        if !self.is_closed {
            return Err(CandleRejected::NotClosed {
                open_time: self.open_time,
            });
        }

        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
            ("quote_volume", self.quote_volume),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CandleRejected::NonFinite {
                open_time: self.open_time,
                field,
            });
        }

        Ok(())
    }
}
