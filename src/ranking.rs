// =============================================================================
// Ranking — ordering and counting published views for display
// =============================================================================
//
// Read-only over `InstrumentView`s.  Only classified instruments are ranked.
// Order: category priority, then confidence, then 24h quote volume, then
// symbol so the output is deterministic.
// =============================================================================

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::engine::InstrumentView;
use crate::signals::SignalCategory;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingFilter {
    pub category: Option<SignalCategory>,
    /// Minimum 24h quote volume.  Instruments without stats count as 0.
    pub min_quote_volume: f64,
    /// Case-insensitive substring of the symbol.
    pub search: Option<String>,
}

impl RankingFilter {
    pub fn matches(&self, view: &InstrumentView) -> bool {
        let Some(signal) = view.signal() else {
            return false;
        };
        if let Some(category) = self.category {
            if signal.category != category {
                return false;
            }
        }
        if view.quote_volume() < self.min_quote_volume {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => view
                .symbol
                .to_ascii_uppercase()
                .contains(&needle.to_ascii_uppercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    #[serde(flatten)]
    pub view: Arc<InstrumentView>,
    /// Signal is younger than the freshness window.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalStats {
    pub total: usize,
    pub bullish: usize,
    pub bearish: usize,
    pub potential: usize,
}

fn compare(a: &InstrumentView, b: &InstrumentView) -> Ordering {
    let (sa, sb) = match (a.signal(), b.signal()) {
        (Some(sa), Some(sb)) => (sa, sb),
        _ => return a.symbol.cmp(&b.symbol),
    };
    sb.category
        .priority()
        .cmp(&sa.category.priority())
        .then_with(|| sb.confidence.cmp(&sa.confidence))
        .then_with(|| b.quote_volume().total_cmp(&a.quote_volume()))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Filter and order `views` for display.
pub fn rank(
    views: &[Arc<InstrumentView>],
    filter: &RankingFilter,
    now_ms: i64,
    freshness_window_ms: i64,
) -> Vec<RankedEntry> {
    let mut selected: Vec<&Arc<InstrumentView>> =
        views.iter().filter(|v| filter.matches(v)).collect();
    selected.sort_by(|a, b| compare(a, b));

    selected
        .into_iter()
        .map(|view| RankedEntry {
            active: view
                .signal()
                .is_some_and(|s| s.is_active(now_ms, freshness_window_ms)),
            view: view.clone(),
        })
        .collect()
}

/// Category counts over the instruments `filter` lets through.
pub fn signal_stats(views: &[Arc<InstrumentView>], filter: &RankingFilter) -> SignalStats {
    let mut stats = SignalStats::default();
    for view in views.iter().filter(|v| filter.matches(v)) {
        let Some(signal) = view.signal() else {
            continue;
        };
        stats.total += 1;
        match signal.category {
            SignalCategory::Bullish => stats.bullish += 1,
            SignalCategory::Bearish => stats.bearish += 1,
            SignalCategory::Potential => stats.potential += 1,
            SignalCategory::None => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Classification;
    use crate::indicators::{IndicatorSnapshot, Readout};
    use crate::signals::{Signal, SignalKind};
    use crate::types::MarketStats;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema9: Some(1.0),
            ema20: Some(1.0),
            ema50: Some(1.0),
            stoch_rsi: Readout::ZeroSentinel,
            macd: Readout::ZeroSentinel,
        }
    }

    fn view(
        symbol: &str,
        kind: SignalKind,
        category: SignalCategory,
        confidence: u8,
        quote_volume: Option<f64>,
        timestamp: i64,
    ) -> Arc<InstrumentView> {
        Arc::new(InstrumentView {
            symbol: symbol.to_string(),
            candles: 60,
            last_price: Some(1.0),
            last_update: Some(timestamp),
            market: quote_volume.map(|q| MarketStats {
                quote_volume: q,
                ..MarketStats::default()
            }),
            classification: Classification::Classified {
                indicators: snapshot(),
                signal: Signal {
                    kind,
                    category,
                    confidence,
                    rationale: String::new(),
                    timestamp,
                },
            },
        })
    }

    fn unclassified(symbol: &str) -> Arc<InstrumentView> {
        Arc::new(InstrumentView {
            symbol: symbol.to_string(),
            candles: 3,
            last_price: Some(1.0),
            last_update: Some(0),
            market: None,
            classification: Classification::Unclassified,
        })
    }

    fn sample() -> Vec<Arc<InstrumentView>> {
        vec![
            view("NONEUSDT", SignalKind::None, SignalCategory::None, 0, Some(9e9), 0),
            view("POTUSDT", SignalKind::PotentialBuy, SignalCategory::Potential, 60, Some(1e6), 0),
            view("BEARUSDT", SignalKind::Sell, SignalCategory::Bearish, 90, Some(1e6), 0),
            view("BULLAUSDT", SignalKind::Buy, SignalCategory::Bullish, 70, Some(5e6), 0),
            view("BULLBUSDT", SignalKind::Buy, SignalCategory::Bullish, 85, None, 0),
            view("BULLCUSDT", SignalKind::Buy, SignalCategory::Bullish, 70, Some(8e6), 0),
            unclassified("NEWUSDT"),
        ]
    }

    fn symbols(entries: &[RankedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.view.symbol.as_str()).collect()
    }

    #[test]
    fn orders_by_category_confidence_volume() {
        let ranked = rank(&sample(), &RankingFilter::default(), 0, 60_000);
        assert_eq!(
            symbols(&ranked),
            vec!["BULLBUSDT", "BULLCUSDT", "BULLAUSDT", "BEARUSDT", "POTUSDT", "NONEUSDT"]
        );
    }

    #[test]
    fn filters_combine() {
        let filter = RankingFilter {
            category: Some(SignalCategory::Bullish),
            min_quote_volume: 1.0,
            search: Some("bullc".to_string()),
        };
        assert_eq!(symbols(&rank(&sample(), &filter, 0, 60_000)), vec!["BULLCUSDT"]);

        let filter = RankingFilter {
            min_quote_volume: 2e6,
            ..RankingFilter::default()
        };
        assert_eq!(
            symbols(&rank(&sample(), &filter, 0, 60_000)),
            vec!["BULLCUSDT", "BULLAUSDT", "NONEUSDT"]
        );
    }

    #[test]
    fn active_flag_follows_freshness_window() {
        let views = vec![
            view("OLDUSDT", SignalKind::Buy, SignalCategory::Bullish, 70, None, 0),
            view("NEWUSDT", SignalKind::Buy, SignalCategory::Bullish, 70, None, 100_000),
        ];
        let ranked = rank(&views, &RankingFilter::default(), 120_000, 60_000);
        let active: Vec<(&str, bool)> = ranked
            .iter()
            .map(|e| (e.view.symbol.as_str(), e.active))
            .collect();
        assert_eq!(active, vec![("NEWUSDT", true), ("OLDUSDT", false)]);
    }

    #[test]
    fn stats_count_filtered_classified_set() {
        let stats = signal_stats(&sample(), &RankingFilter::default());
        assert_eq!(
            stats,
            SignalStats {
                total: 6,
                bullish: 3,
                bearish: 1,
                potential: 1,
            }
        );

        let filter = RankingFilter {
            search: Some("BULL".to_string()),
            ..RankingFilter::default()
        };
        assert_eq!(signal_stats(&sample(), &filter).total, 3);
    }

    #[test]
    fn entry_serialises_flat() {
        let ranked = rank(&sample()[3..4], &RankingFilter::default(), 0, 60_000);
        let json = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(json["symbol"], "BULLAUSDT");
        assert_eq!(json["active"], true);
        assert_eq!(json["classification"]["signal"]["kind"], "BUY");
    }
}
