// =============================================================================
// CandleSeries -- bounded, oldest-first history of closed candles
// =============================================================================
//
// One series per instrument, owned by its `InstrumentEngine`.  Appending past
// capacity evicts the oldest candle (FIFO).  The series never rejects input:
// ordering and shape checks happen at the engine boundary.
// =============================================================================

use std::collections::VecDeque;

use super::Candle;

/// Default number of candles retained per instrument.
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    /// Create an empty series retaining at most `capacity` candles.  A zero
    /// capacity is bumped to one so the latest candle is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a candle at the tail, evicting from the head while over capacity.
    pub fn append(&mut self, candle: Candle) {
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }

    /// Replace the whole history with `candles` (oldest-first).  Only the most
    /// recent `capacity` candles are kept.
    pub fn replace(&mut self, candles: impl IntoIterator<Item = Candle>) {
        self.candles.clear();
        for candle in candles {
            self.append(candle);
        }
    }

    /// Close prices, oldest-first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CandleSeries {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
