// =============================================================================
// Error types for the signal engine
// =============================================================================
//
// Insufficient history is a valid state, not an error, and degenerate
// arithmetic is resolved by sentinel rules inside the indicators.  The only
// failures the core reports are contract violations at the candle boundary.
// =============================================================================

use thiserror::Error;

/// Why a candle was refused at the engine boundary.  A rejected candle never
/// touches the series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleRejected {
    #[error("candle opened at {open_time} is not closed yet")]
    NotClosed { open_time: i64 },

    #[error("candle opened at {open_time} has non-finite {field}")]
    NonFinite { open_time: i64, field: &'static str },

    #[error("candle opened at {open_time} arrived after {last_open_time}")]
    OutOfOrder { open_time: i64, last_open_time: i64 },

    #[error("candle opened at {open_time} was already accepted")]
    Duplicate { open_time: i64 },

    #[error("candle opened at {open_time} skips ahead of {expected_open_time}")]
    Gap { open_time: i64, expected_open_time: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(pub String);
