// =============================================================================
// Stochastic RSI
// =============================================================================
//
// A stochastic oscillator over RSI values instead of price:
//
//   raw_k = (rsi - min(window)) / (max(window) - min(window)) * 100
//   %K    = SMA(raw_k, smooth)
//   %D    = SMA(%K, smooth)
//
// A flat window (max == min) yields 50.  Only the latest {k, d} pair is
// exposed; too little RSI history gives `Readout::ZeroSentinel`.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::rsi::calculate_rsi;
use super::sma::calculate_sma;
use super::Readout;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_STOCH_PERIOD: usize = 14;
pub const DEFAULT_SMOOTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StochRsi {
    pub k: f64,
    pub d: f64,
}

/// Raw stochastic %K over every full `stoch_period` window of `rsi`.
fn raw_stochastic(rsi: &[f64], stoch_period: usize) -> Vec<f64> {
    if stoch_period == 0 || rsi.len() < stoch_period {
        return Vec::new();
    }
    rsi.windows(stoch_period)
        .map(|window| {
            let min = window.iter().copied().fold(f64::INFINITY, f64::min);
            let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let current = window[window.len() - 1];
            if max == min {
                50.0
            } else {
                (current - min) / (max - min) * 100.0
            }
        })
        .collect()
}

/// Latest smoothed StochRSI for `prices`.
///
/// Returns `ZeroSentinel` when there are fewer than `stoch_period` RSI values,
/// or when smoothing has not yet produced a %D value.
pub fn calculate_stoch_rsi(
    prices: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    smooth: usize,
) -> Readout<StochRsi> {
    let rsi = calculate_rsi(prices, rsi_period);
    if stoch_period == 0 || rsi.len() < stoch_period {
        return Readout::ZeroSentinel;
    }

    let raw = raw_stochastic(&rsi, stoch_period);
    let k_values = calculate_sma(&raw, smooth);
    let d_values = calculate_sma(&k_values, smooth);

    match (k_values.last(), d_values.last()) {
        (Some(&k), Some(&d)) => Readout::Ready(StochRsi { k, d }),
        _ => Readout::ZeroSentinel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 5.0 * (i as f64 * 0.3).sin() + 0.1 * i as f64)
            .collect()
    }

    #[test]
    fn short_history_is_zero_sentinel() {
        // 20 prices => 6 RSI values < 14.
        let out = calculate_stoch_rsi(&wave(20), 14, 14, 3);
        assert_eq!(out, Readout::ZeroSentinel);
        assert_eq!(out.resolve(), StochRsi { k: 0.0, d: 0.0 });
    }

    #[test]
    fn unsmoothed_history_is_zero_sentinel() {
        // 28 prices => 14 RSI values => 1 raw value, no %K yet.
        assert_eq!(calculate_stoch_rsi(&wave(28), 14, 14, 3), Readout::ZeroSentinel);
        // 32 prices => 18 RSI => 5 raw => 3 %K => 1 %D.
        assert!(calculate_stoch_rsi(&wave(32), 14, 14, 3).is_ready());
    }

    #[test]
    fn flat_rsi_window_reads_fifty() {
        // Strictly rising prices keep RSI pinned at 100.
        let prices: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let out = calculate_stoch_rsi(&prices, 14, 14, 3);
        assert_eq!(out, Readout::Ready(StochRsi { k: 50.0, d: 50.0 }));
    }

    #[test]
    fn raw_stochastic_hits_extremes() {
        let raw = raw_stochastic(&[10.0, 20.0, 30.0, 15.0, 5.0], 3);
        assert_eq!(raw.len(), 3);
        assert!((raw[0] - 100.0).abs() < 1e-12);
        assert_eq!(raw[1], 0.0);
        assert_eq!(raw[2], 0.0);
    }

    #[test]
    fn d_is_average_of_last_k_values() {
        let prices = wave(120);
        let rsi = calculate_rsi(&prices, 14);
        let raw = raw_stochastic(&rsi, 14);
        let k = calculate_sma(&raw, 3);
        let expected_d = k[k.len() - 3..].iter().sum::<f64>() / 3.0;

        let out = calculate_stoch_rsi(&prices, 14, 14, 3).resolve();
        assert_eq!(out.k, *k.last().unwrap());
        assert!((out.d - expected_d).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn k_and_d_stay_in_range(prices in prop::collection::vec(1.0f64..10_000.0, 32..200)) {
            let out = calculate_stoch_rsi(&prices, 14, 14, 3);
            prop_assert!(out.is_ready());
            let StochRsi { k, d } = out.resolve();
            prop_assert!((0.0..=100.0).contains(&k), "k = {}", k);
            prop_assert!((0.0..=100.0).contains(&d), "d = {}", d);
        }
    }
}
