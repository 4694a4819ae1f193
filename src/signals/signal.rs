// =============================================================================
// Signal — the classifier's output for one instrument
// =============================================================================

use serde::{Deserialize, Serialize};

/// Default window during which a signal counts as active on a display.
pub const DEFAULT_FRESHNESS_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    None,
    Buy,
    PotentialBuy,
    Sell,
    PotentialSell,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Buy => write!(f, "BUY"),
            Self::PotentialBuy => write!(f, "POTENTIAL_BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::PotentialSell => write!(f, "POTENTIAL_SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalCategory {
    None,
    Bullish,
    Bearish,
    Potential,
}

impl SignalCategory {
    /// Display priority: bullish > bearish > potential > none.
    pub fn priority(self) -> u8 {
        match self {
            Self::Bullish => 4,
            Self::Bearish => 3,
            Self::Potential => 2,
            Self::None => 1,
        }
    }
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Potential => write!(f, "potential"),
        }
    }
}

impl std::str::FromStr for SignalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "bullish" => Ok(Self::Bullish),
            "bearish" => Ok(Self::Bearish),
            "potential" => Ok(Self::Potential),
            other => Err(format!("unknown signal category: {other}")),
        }
    }
}

/// A classified signal.  Built whole by the classifier and never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub category: SignalCategory,
    /// 0..=100.
    pub confidence: u8,
    pub rationale: String,
    /// Classification time, unix milliseconds.
    pub timestamp: i64,
}

impl Signal {
    /// Whether the signal is recent enough to be flagged as active.
    pub fn is_active(&self, now_ms: i64, window_ms: i64) -> bool {
        now_ms - self.timestamp < window_ms
    }
}
