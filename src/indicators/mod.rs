// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the classifier
// consumes.  Two kinds of "not ready" exist and are kept apart on purpose:
//
//   - `AlignedSeries::get` / `last` return `None` (absent) before an EMA's
//     seed index.
//   - StochRSI and MACD expose a `Readout`, which is `ZeroSentinel` when the
//     input is too short; it resolves to zeros but is never mistaken for a
//     real reading.

pub mod ema;
pub mod macd;
pub mod pipeline;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;

use serde::{Deserialize, Serialize};

pub use macd::Macd;
pub use pipeline::{IndicatorFrame, IndicatorPipeline, IndicatorSnapshot};
pub use stoch_rsi::StochRsi;

/// A dense run of indicator values laid over a source sequence of length
/// `len`; index `i` of the source maps to `values[i - offset]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedSeries {
    len: usize,
    offset: usize,
    values: Vec<f64>,
}

impl AlignedSeries {
    /// `values` must end at the last source index.
    pub fn new(len: usize, values: Vec<f64>) -> Self {
        let offset = len.saturating_sub(values.len());
        Self { len, offset, values }
    }

    /// Value at source index `index`, absent before the seed index.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index < self.offset || index >= self.len {
            return None;
        }
        self.values.get(index - self.offset).copied()
    }

    /// Value at the last source index.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value at the second-to-last source index.
    pub fn previous(&self) -> Option<f64> {
        self.get(self.len.checked_sub(2)?)
    }

    /// Length of the source sequence, defined or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of defined values.
    pub fn defined(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Latest reading of an indicator that reports a zero default instead of an
/// absence when history is short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Readout<T> {
    Ready(T),
    ZeroSentinel,
}

impl<T: Default + Copy> Readout<T> {
    /// The reading, or the all-zero default for the sentinel.
    pub fn resolve(&self) -> T {
        match self {
            Self::Ready(v) => *v,
            Self::ZeroSentinel => T::default(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}
