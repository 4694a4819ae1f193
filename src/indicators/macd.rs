// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line      = EMA(fast) - EMA(slow)     where both are defined
//   signal    = EMA(line, signal_period)
//   histogram = line - signal             aligned at the signal's first value
//
// Only the latest triple is exposed.  Without a signal value the readout is
// `ZeroSentinel`, which resolves to all-zero fields.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::{calculate_ema, ema_aligned};
use super::Readout;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Full MACD output.  `signal` and `histogram` share an origin that lags
/// `line` by `signal_period - 1` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    pub fn latest(&self) -> Readout<Macd> {
        match (self.line.last(), self.signal.last(), self.histogram.last()) {
            (Some(&line), Some(&signal), Some(&histogram)) => Readout::Ready(Macd {
                line,
                signal,
                histogram,
            }),
            _ => Readout::ZeroSentinel,
        }
    }
}

pub fn calculate_macd_series(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdSeries {
    if fast == 0 || slow == 0 {
        return MacdSeries::default();
    }

    let ema_fast = ema_aligned(prices, fast);
    let ema_slow = ema_aligned(prices, slow);

    let start = fast.max(slow) - 1;
    let line: Vec<f64> = (start..prices.len())
        .filter_map(|i| Some(ema_fast.get(i)? - ema_slow.get(i)?))
        .collect();

    let signal = calculate_ema(&line, signal_period);
    let lag = signal_period.saturating_sub(1);
    let histogram = line
        .iter()
        .skip(lag)
        .zip(&signal)
        .map(|(l, s)| l - s)
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

/// Latest MACD triple for `prices`.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Readout<Macd> {
    calculate_macd_series(prices, fast, slow, signal_period).latest()
}
