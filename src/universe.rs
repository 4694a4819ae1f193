// =============================================================================
// Instrument universe
// =============================================================================

use crate::binance::SymbolInfo;

const TRADING: &str = "TRADING";

/// Pick the tradable spot symbols quoted in `quote_asset`, skipping any
/// symbol that contains one of `excluded_fragments` (leveraged tokens).
/// Result is sorted and deduplicated.
pub fn select_symbols(
    exchange_symbols: &[SymbolInfo],
    quote_asset: &str,
    excluded_fragments: &[String],
) -> Vec<String> {
    let mut selected: Vec<String> = exchange_symbols
        .iter()
        .filter(|s| s.status == TRADING)
        .filter(|s| s.quote_asset.eq_ignore_ascii_case(quote_asset))
        .filter(|s| {
            !excluded_fragments
                .iter()
                .any(|frag| !frag.is_empty() && s.symbol.contains(frag.as_str()))
        })
        .map(|s| s.symbol.clone())
        .collect();

    selected.sort();
    selected.dedup();
    selected
}
