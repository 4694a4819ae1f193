// =============================================================================
// Signal Classifier — EMA cross detection with oscillator confirmation
// =============================================================================
//
// Rules, first match wins for the base signal:
//   1. EMA9 crosses above EMA20  -> BUY (EMA20 > EMA50) or POTENTIAL_BUY
//   2. EMA9 crosses below EMA20  -> SELL (EMA20 < EMA50) or POTENTIAL_SELL
//   3. No cross:
//        a. EMA9 within `touch_threshold` of EMA50   -> BUY / SELL at 75
//        b. EMA9 within `near_cross_threshold` of EMA20 -> POTENTIAL_* at 50
//        c. otherwise NONE
//
// Bullish and bearish bases (never potential) then take +10 for an agreeing
// StochRSI and +10 for an agreeing MACD, capped at 100.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::signal::{Signal, SignalCategory, SignalKind};
use crate::indicators::{IndicatorFrame, Macd, StochRsi};

const STRONG_CROSS_CONFIDENCE: u8 = 85;
const WEAK_CROSS_CONFIDENCE: u8 = 60;
const TOUCH_CONFIDENCE: u8 = 75;
const NEAR_CROSS_CONFIDENCE: u8 = 50;
const CONFIRMATION_BOOST: u8 = 10;
const MAX_CONFIDENCE: u8 = 100;

const STOCH_OVERBOUGHT: f64 = 80.0;
const STOCH_OVERSOLD: f64 = 20.0;

fn default_touch_threshold() -> f64 {
    0.002
}

fn default_near_cross_threshold() -> f64 {
    0.002
}

/// Relative proximity thresholds used by the no-cross rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// |EMA9 - EMA50| / EMA50 below this counts as a touch.
    #[serde(default = "default_touch_threshold")]
    pub touch_threshold: f64,

    /// |EMA9 - EMA20| / EMA20 below this counts as a near-cross.
    #[serde(default = "default_near_cross_threshold")]
    pub near_cross_threshold: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            touch_threshold: default_touch_threshold(),
            near_cross_threshold: default_near_cross_threshold(),
        }
    }
}

/// The values one classification needs: the last two EMA9/EMA20 points, the
/// latest EMA50 and the latest oscillator readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    pub ema9_prev: f64,
    pub ema20_prev: f64,
    pub ema9: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub stoch_rsi: StochRsi,
    pub macd: Macd,
}

impl ClassifierInput {
    /// Pull the classifier inputs out of a pipeline pass.  Returns `None` when
    /// EMA9/EMA20 lack a previous value or EMA50 lacks a current one; the
    /// instrument then stays unclassified.
    pub fn from_frame(frame: &IndicatorFrame) -> Option<Self> {
        Some(Self {
            ema9_prev: frame.ema9.previous()?,
            ema20_prev: frame.ema20.previous()?,
            ema9: frame.ema9.last()?,
            ema20: frame.ema20.last()?,
            ema50: frame.ema50.last()?,
            stoch_rsi: frame.stoch_rsi.resolve(),
            macd: frame.macd.resolve(),
        })
    }
}

/// `|a - b| / |b|`, or `None` when `b` is zero.
fn relative_distance(a: f64, b: f64) -> Option<f64> {
    if b == 0.0 {
        return None;
    }
    Some((a - b).abs() / b.abs())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalClassifier {
    params: ClassifierParams,
}

impl SignalClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Classify one instrument at `timestamp` (unix ms).
    pub fn classify(&self, input: &ClassifierInput, timestamp: i64) -> Signal {
        let (kind, category, mut confidence, base) = self.base_signal(input);

        let mut confirmations: Vec<&'static str> = Vec::new();
        match category {
            SignalCategory::Bullish => {
                let stoch = input.stoch_rsi;
                if stoch.k > stoch.d && stoch.k < STOCH_OVERBOUGHT {
                    confirmations.push("StochRSI bullish");
                }
                if input.macd.line > input.macd.signal {
                    confirmations.push("MACD bullish");
                }
            }
            SignalCategory::Bearish => {
                let stoch = input.stoch_rsi;
                if stoch.k < stoch.d && stoch.k > STOCH_OVERSOLD {
                    confirmations.push("StochRSI bearish");
                }
                if input.macd.line < input.macd.signal {
                    confirmations.push("MACD bearish");
                }
            }
            SignalCategory::Potential | SignalCategory::None => {}
        }

        let boost = CONFIRMATION_BOOST.saturating_mul(confirmations.len() as u8);
        confidence = confidence.saturating_add(boost);

        let rationale = if confirmations.is_empty() {
            base.to_string()
        } else {
            format!("{base}, {}", confirmations.join(", "))
        };

        Signal {
            kind,
            category,
            confidence: confidence.min(MAX_CONFIDENCE),
            rationale,
            timestamp,
        }
    }

    fn base_signal(&self, input: &ClassifierInput) -> (SignalKind, SignalCategory, u8, &'static str) {
        let crossed_above = input.ema9_prev <= input.ema20_prev && input.ema9 > input.ema20;
        let crossed_below = input.ema9_prev >= input.ema20_prev && input.ema9 < input.ema20;

        if crossed_above {
            return if input.ema20 > input.ema50 {
                (
                    SignalKind::Buy,
                    SignalCategory::Bullish,
                    STRONG_CROSS_CONFIDENCE,
                    "trend-confirmed bullish cross",
                )
            } else {
                (
                    SignalKind::PotentialBuy,
                    SignalCategory::Potential,
                    WEAK_CROSS_CONFIDENCE,
                    "bullish cross awaiting trend confirmation",
                )
            };
        }

        if crossed_below {
            return if input.ema20 < input.ema50 {
                (
                    SignalKind::Sell,
                    SignalCategory::Bearish,
                    STRONG_CROSS_CONFIDENCE,
                    "trend-confirmed bearish cross",
                )
            } else {
                (
                    SignalKind::PotentialSell,
                    SignalCategory::Potential,
                    WEAK_CROSS_CONFIDENCE,
                    "bearish cross awaiting trend confirmation",
                )
            };
        }

        let touching = relative_distance(input.ema9, input.ema50)
            .is_some_and(|d| d < self.params.touch_threshold);
        if touching && input.ema9 > input.ema20 {
            return (
                SignalKind::Buy,
                SignalCategory::Bullish,
                TOUCH_CONFIDENCE,
                "bullish bounce expected",
            );
        }
        if touching && input.ema9 < input.ema20 {
            return (
                SignalKind::Sell,
                SignalCategory::Bearish,
                TOUCH_CONFIDENCE,
                "bearish rejection expected",
            );
        }

        let near_cross = relative_distance(input.ema9, input.ema20)
            .is_some_and(|d| d < self.params.near_cross_threshold);
        if near_cross {
            return if input.ema9 > input.ema20 {
                (
                    SignalKind::PotentialBuy,
                    SignalCategory::Potential,
                    NEAR_CROSS_CONFIDENCE,
                    "bullish cross may occur soon",
                )
            } else {
                (
                    SignalKind::PotentialSell,
                    SignalCategory::Potential,
                    NEAR_CROSS_CONFIDENCE,
                    "bearish cross may occur soon",
                )
            };
        }

        (SignalKind::None, SignalCategory::None, 0, "no clear signal")
    }
}
