// =============================================================================
// Signal Engine — per-instrument orchestration and the published read path
// =============================================================================
//
// Every instrument gets an `InstrumentEngine` (its candle series plus the
// latest classification) behind a writer mutex, and a published
// `Arc<InstrumentView>` behind a read lock.  Candle processing for one
// instrument is serialised by the mutex; readers only ever clone the Arc, so
// they observe either the previous view or the next one, never a mix.
//
// Thread safety:
//   - parking_lot::Mutex per instrument for the single writer.
//   - parking_lot::RwLock for the instrument map and each published view.
//   - AtomicU64 state version, bumped on every publish.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CandleRejected;
use crate::indicators::{IndicatorPipeline, IndicatorSnapshot};
use crate::market_data::candle_series::DEFAULT_CAPACITY;
use crate::market_data::{Candle, CandleSeries};
use crate::signals::{ClassifierInput, ClassifierParams, Signal, SignalClassifier};
use crate::types::{MarketStats, Timeframe};

/// Closes required before the indicator pipeline runs at all.
pub const DEFAULT_MIN_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub history_capacity: usize,
    pub min_history: usize,
    pub classifier: ClassifierParams,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            min_history: DEFAULT_MIN_HISTORY,
            classifier: ClassifierParams::default(),
        }
    }
}

// =============================================================================
// Published view
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    /// Not enough history for indicators or for cross detection.
    Unclassified,
    Classified {
        indicators: IndicatorSnapshot,
        signal: Signal,
    },
}

impl Classification {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Classified { signal, .. } => Some(signal),
            Self::Unclassified => None,
        }
    }

    pub fn indicators(&self) -> Option<&IndicatorSnapshot> {
        match self {
            Self::Classified { indicators, .. } => Some(indicators),
            Self::Unclassified => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }
}

/// Immutable, internally consistent state of one instrument as seen by
/// readers.  Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentView {
    pub symbol: String,
    pub candles: usize,
    pub last_price: Option<f64>,
    /// When the last candle or seed was processed, unix ms.
    pub last_update: Option<i64>,
    pub market: Option<MarketStats>,
    pub classification: Classification,
}

impl InstrumentView {
    fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            candles: 0,
            last_price: None,
            last_update: None,
            market: None,
            classification: Classification::Unclassified,
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        self.classification.signal()
    }

    pub fn quote_volume(&self) -> f64 {
        self.market.map_or(0.0, |m| m.quote_volume)
    }
}

// =============================================================================
// InstrumentEngine
// =============================================================================

/// Owns one instrument's candle series and its latest classification.
pub struct InstrumentEngine {
    symbol: String,
    /// Candle interval; consecutive live candles must be exactly this far apart.
    interval_ms: i64,
    series: CandleSeries,
    min_history: usize,
    classifier: SignalClassifier,
    market: Option<MarketStats>,
    classification: Classification,
    last_update: Option<i64>,
}

impl InstrumentEngine {
    pub fn new(symbol: impl Into<String>, settings: &EngineSettings, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            interval_ms: timeframe.duration_ms(),
            series: CandleSeries::new(settings.history_capacity),
            min_history: settings.min_history,
            classifier: SignalClassifier::new(settings.classifier),
            market: None,
            classification: Classification::Unclassified,
            last_update: None,
        }
    }

    /// Nothing has been accepted for this instrument yet.
    fn is_pristine(&self) -> bool {
        self.series.is_empty() && self.market.is_none()
    }

    /// Validate, append and reclassify.  A rejected candle leaves the series
    /// and the classification untouched.  A candle that skips one or more
    /// intervals is rejected as a gap; the history must be seeded again.
    pub fn submit(&mut self, candle: Candle, now_ms: i64) -> Result<(), CandleRejected> {
        candle.validate()?;
        if let Some(last) = self.series.last() {
            if candle.open_time == last.open_time {
                return Err(CandleRejected::Duplicate {
                    open_time: candle.open_time,
                });
            }
            if candle.open_time < last.open_time {
                return Err(CandleRejected::OutOfOrder {
                    open_time: candle.open_time,
                    last_open_time: last.open_time,
                });
            }
            let expected_open_time = last.open_time + self.interval_ms;
            if candle.open_time > expected_open_time {
                return Err(CandleRejected::Gap {
                    open_time: candle.open_time,
                    expected_open_time,
                });
            }
        }

        self.series.append(candle);
        self.recompute(now_ms);
        Ok(())
    }

    /// Replace the history with an oldest-first backfill.  The batch is
    /// validated as a whole; on error nothing changes.
    pub fn seed(&mut self, candles: &[Candle], now_ms: i64) -> Result<(), CandleRejected> {
        for candle in candles {
            candle.validate()?;
        }
        for pair in candles.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.open_time == prev.open_time {
                return Err(CandleRejected::Duplicate {
                    open_time: next.open_time,
                });
            }
            if next.open_time < prev.open_time {
                return Err(CandleRejected::OutOfOrder {
                    open_time: next.open_time,
                    last_open_time: prev.open_time,
                });
            }
        }

        if candles.len() > self.series.capacity() {
            warn!(
                symbol = %self.symbol,
                supplied = candles.len(),
                capacity = self.series.capacity(),
                "historical seed exceeds capacity; keeping the most recent candles"
            );
        }

        self.series.replace(candles.iter().copied());
        self.recompute(now_ms);
        Ok(())
    }

    pub fn set_market_stats(&mut self, stats: MarketStats) {
        self.market = Some(stats);
    }

    /// Full pass over the current series.  The classification is rebuilt as
    /// a whole value.
    fn recompute(&mut self, now_ms: i64) {
        self.last_update = Some(now_ms);

        if self.series.len() < self.min_history {
            self.classification = Classification::Unclassified;
            return;
        }

        let closes = self.series.closes();
        let frame = IndicatorPipeline::compute(&closes);

        let Some(input) = ClassifierInput::from_frame(&frame) else {
            self.classification = Classification::Unclassified;
            return;
        };

        let was_classified = self.classification.is_classified();
        let signal = self.classifier.classify(&input, now_ms);

        if !was_classified {
            info!(
                symbol = %self.symbol,
                candles = self.series.len(),
                kind = %signal.kind,
                confidence = signal.confidence,
                "instrument classified"
            );
        } else {
            debug!(
                symbol = %self.symbol,
                kind = %signal.kind,
                confidence = signal.confidence,
                "signal updated"
            );
        }

        self.classification = Classification::Classified {
            indicators: frame.snapshot(),
            signal,
        };
    }

    pub fn view(&self) -> InstrumentView {
        InstrumentView {
            symbol: self.symbol.clone(),
            candles: self.series.len(),
            last_price: self.series.last().map(|c| c.close),
            last_update: self.last_update,
            market: self.market,
            classification: self.classification.clone(),
        }
    }
}

// =============================================================================
// SignalEngine
// =============================================================================

struct InstrumentSlot {
    writer: Mutex<InstrumentEngine>,
    published: RwLock<Arc<InstrumentView>>,
}

impl InstrumentSlot {
    fn new(symbol: &str, settings: &EngineSettings, timeframe: Timeframe) -> Self {
        Self {
            writer: Mutex::new(InstrumentEngine::new(symbol, settings, timeframe)),
            published: RwLock::new(Arc::new(InstrumentView::empty(symbol))),
        }
    }
}

/// Owns every instrument's engine for one timeframe.  No global state: the
/// whole collection lives and dies with this value.
pub struct SignalEngine {
    settings: EngineSettings,
    timeframe: RwLock<Timeframe>,
    instruments: RwLock<HashMap<String, Arc<InstrumentSlot>>>,
    state_version: AtomicU64,
}

impl SignalEngine {
    pub fn new(settings: EngineSettings, timeframe: Timeframe) -> Self {
        Self {
            settings,
            timeframe: RwLock::new(timeframe),
            instruments: RwLock::new(HashMap::new()),
            state_version: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ── Version Management ──────────────────────────────────────────────

    fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Writers ─────────────────────────────────────────────────────────

    fn slot(&self, symbol: &str) -> Arc<InstrumentSlot> {
        if let Some(slot) = self.instruments.read().get(symbol) {
            return slot.clone();
        }
        let timeframe = self.timeframe();
        let mut map = self.instruments.write();
        map.entry(symbol.to_string())
            .or_insert_with(|| Arc::new(InstrumentSlot::new(symbol, &self.settings, timeframe)))
            .clone()
    }

    /// Drop `slot` if a rejected write left it without any accepted data and
    /// no other caller holds it.
    fn discard_if_pristine(&self, symbol: &str, slot: &Arc<InstrumentSlot>, engine: &InstrumentEngine) {
        if !engine.is_pristine() {
            return;
        }
        let mut map = self.instruments.write();
        let ours = map.get(symbol).is_some_and(|s| Arc::ptr_eq(s, slot));
        // Clones are only handed out under the map lock: the map's and ours.
        if ours && Arc::strong_count(slot) == 2 {
            map.remove(symbol);
        }
    }

    /// Run `update` under the instrument's writer lock and publish the result.
    fn update_and_publish<F>(&self, symbol: &str, update: F) -> Result<Arc<InstrumentView>, CandleRejected>
    where
        F: FnOnce(&mut InstrumentEngine) -> Result<(), CandleRejected>,
    {
        let slot = self.slot(symbol);
        let mut engine = slot.writer.lock();
        if let Err(rejected) = update(&mut engine) {
            self.discard_if_pristine(symbol, &slot, &engine);
            return Err(rejected);
        }

        let view = Arc::new(engine.view());
        *slot.published.write() = view.clone();
        self.increment_version();
        Ok(view)
    }

    /// Feed one closed candle for `symbol`, in time order.
    pub fn submit_closed_candle(
        &self,
        symbol: &str,
        candle: Candle,
    ) -> Result<Arc<InstrumentView>, CandleRejected> {
        self.submit_closed_candle_at(symbol, candle, Utc::now().timestamp_millis())
    }

    pub fn submit_closed_candle_at(
        &self,
        symbol: &str,
        candle: Candle,
        now_ms: i64,
    ) -> Result<Arc<InstrumentView>, CandleRejected> {
        self.update_and_publish(symbol, |engine| engine.submit(candle, now_ms))
    }

    /// Replace `symbol`'s history with a backfill, oldest-first.
    pub fn set_historical_seed(
        &self,
        symbol: &str,
        candles: &[Candle],
    ) -> Result<Arc<InstrumentView>, CandleRejected> {
        self.set_historical_seed_at(symbol, candles, Utc::now().timestamp_millis())
    }

    pub fn set_historical_seed_at(
        &self,
        symbol: &str,
        candles: &[Candle],
        now_ms: i64,
    ) -> Result<Arc<InstrumentView>, CandleRejected> {
        self.update_and_publish(symbol, |engine| engine.seed(candles, now_ms))
    }

    /// Attach 24h market statistics; the classification is not recomputed.
    pub fn update_market_stats(&self, symbol: &str, stats: MarketStats) -> Arc<InstrumentView> {
        let slot = self.slot(symbol);
        let mut engine = slot.writer.lock();
        engine.set_market_stats(stats);

        let view = Arc::new(engine.view());
        *slot.published.write() = view.clone();
        self.increment_version();
        view
    }

    /// Forget one instrument entirely.
    pub fn remove_instrument(&self, symbol: &str) -> bool {
        let removed = self.instruments.write().remove(symbol).is_some();
        if removed {
            self.increment_version();
        }
        removed
    }

    /// Discard every series and published view.
    pub fn reset(&self) {
        let dropped = {
            let mut map = self.instruments.write();
            let n = map.len();
            map.clear();
            n
        };
        self.increment_version();
        info!(instruments = dropped, "engine state discarded");
    }

    /// Switch to a new candle interval.  All history belongs to the old
    /// interval, so everything is discarded and must be backfilled again.
    /// Returns `false` if `timeframe` is already active.
    pub fn switch_timeframe(&self, timeframe: Timeframe) -> bool {
        {
            let mut current = self.timeframe.write();
            if *current == timeframe {
                return false;
            }
            info!(from = %*current, to = %timeframe, "switching timeframe");
            *current = timeframe;
        }
        self.reset();
        true
    }

    pub fn timeframe(&self) -> Timeframe {
        *self.timeframe.read()
    }

    // ── Readers ─────────────────────────────────────────────────────────

    /// Latest published view of `symbol`, or `None` if it was never seen.
    pub fn get_snapshot(&self, symbol: &str) -> Option<Arc<InstrumentView>> {
        let slot = self.instruments.read().get(symbol).cloned()?;
        let view = slot.published.read().clone();
        Some(view)
    }

    /// Every published view, ordered by symbol.
    pub fn snapshots(&self) -> Vec<Arc<InstrumentView>> {
        let slots: Vec<Arc<InstrumentSlot>> = self.instruments.read().values().cloned().collect();
        let mut views: Vec<Arc<InstrumentView>> =
            slots.iter().map(|s| s.published.read().clone()).collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        views
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.read().len()
    }
}
