// =============================================================================
// Signals Module
// =============================================================================
//
// - Signal / kind / category types and display freshness
// - The EMA cross classifier with StochRSI + MACD confirmation

pub mod classifier;
pub mod signal;

pub use classifier::{ClassifierInput, ClassifierParams, SignalClassifier};
pub use signal::{Signal, SignalCategory, SignalKind};
