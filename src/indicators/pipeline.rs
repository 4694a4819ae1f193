// =============================================================================
// Indicator Pipeline
// =============================================================================
//
// One full pass over a close-price sequence: EMA 9/20/50, StochRSI(14,3,3)
// and MACD(12,26,9).  Nothing is carried between passes; the frame is
// rebuilt from scratch on every accepted candle.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::ema_aligned;
use super::macd::{self, calculate_macd, Macd};
use super::stoch_rsi::{self, calculate_stoch_rsi, StochRsi};
use super::{AlignedSeries, Readout};

pub const EMA_FAST: usize = 9;
pub const EMA_MID: usize = 20;
pub const EMA_TREND: usize = 50;
/// Stochastic lookback over the RSI series (the function default is 14).
pub const STOCH_WINDOW: usize = 3;

/// Latest indicator values published with a classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema9: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub stoch_rsi: Readout<StochRsi>,
    pub macd: Readout<Macd>,
}

/// Everything one pipeline pass produced.  The EMA series are kept whole so
/// the classifier can look one step back.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub ema9: AlignedSeries,
    pub ema20: AlignedSeries,
    pub ema50: AlignedSeries,
    pub stoch_rsi: Readout<StochRsi>,
    pub macd: Readout<Macd>,
}

impl IndicatorFrame {
    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema9: self.ema9.last(),
            ema20: self.ema20.last(),
            ema50: self.ema50.last(),
            stoch_rsi: self.stoch_rsi,
            macd: self.macd,
        }
    }
}

pub struct IndicatorPipeline;

impl IndicatorPipeline {
    pub fn compute(closes: &[f64]) -> IndicatorFrame {
        IndicatorFrame {
            ema9: ema_aligned(closes, EMA_FAST),
            ema20: ema_aligned(closes, EMA_MID),
            ema50: ema_aligned(closes, EMA_TREND),
            stoch_rsi: calculate_stoch_rsi(
                closes,
                stoch_rsi::DEFAULT_RSI_PERIOD,
                STOCH_WINDOW,
                stoch_rsi::DEFAULT_SMOOTH,
            ),
            macd: calculate_macd(
                closes,
                macd::DEFAULT_FAST,
                macd::DEFAULT_SLOW,
                macd::DEFAULT_SIGNAL,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 250.0 + 10.0 * (i as f64 * 0.11).sin() + 0.05 * i as f64)
            .collect()
    }

    #[test]
    fn fifty_closes_define_every_latest_ema() {
        let frame = IndicatorPipeline::compute(&closes(50));
        let snap = frame.snapshot();
        assert!(snap.ema9.is_some());
        assert!(snap.ema20.is_some());
        assert!(snap.ema50.is_some());
        assert!(frame.ema50.previous().is_none());
        assert!(frame.ema20.previous().is_some());
        assert!(snap.stoch_rsi.is_ready());
        assert!(snap.macd.is_ready());
    }

    #[test]
    fn short_input_mixes_absent_and_sentinel() {
        let frame = IndicatorPipeline::compute(&closes(16));
        let snap = frame.snapshot();
        assert!(snap.ema9.is_some());
        assert!(snap.ema50.is_none());
        assert_eq!(snap.stoch_rsi, Readout::ZeroSentinel);
        assert_eq!(snap.macd, Readout::ZeroSentinel);

        // 30 closes: 16 RSI values fill the 3-wide window, MACD has no
        // signal line yet.
        let snap = IndicatorPipeline::compute(&closes(30)).snapshot();
        assert!(snap.stoch_rsi.is_ready());
        assert_eq!(snap.macd, Readout::ZeroSentinel);
    }

    #[test]
    fn stoch_rsi_uses_three_wide_window() {
        // Noisy closes where the window choice flips %K against %D.
        let data: Vec<f64> = (0..97)
            .map(|i| {
                let x = i as f64;
                100.0 + 4.0 * (x * 0.37).sin() + 2.5 * (x * 1.91).cos() + 0.8 * (x * 5.3).sin()
            })
            .collect();
        let frame = IndicatorPipeline::compute(&data);
        assert_eq!(frame.stoch_rsi, calculate_stoch_rsi(&data, 14, 3, 3));
        assert_ne!(
            frame.stoch_rsi,
            calculate_stoch_rsi(&data, 14, stoch_rsi::DEFAULT_STOCH_PERIOD, 3)
        );
    }

    #[test]
    fn recompute_is_bit_identical() {
        let data = closes(200);
        let a = IndicatorPipeline::compute(&data);
        let b = IndicatorPipeline::compute(&data);
        assert_eq!(a, b);
        let (sa, sb) = (a.snapshot(), b.snapshot());
        assert_eq!(
            sa.ema50.map(f64::to_bits),
            sb.ema50.map(f64::to_bits)
        );
    }

    #[test]
    fn snapshot_serialises_readout_states() {
        let snap = IndicatorPipeline::compute(&closes(30)).snapshot();
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["ema50"], serde_json::Value::Null);
        assert_eq!(json["macd"]["state"], "zero_sentinel");
    }
}
