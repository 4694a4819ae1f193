// =============================================================================
// API Module
// =============================================================================
//
// - REST endpoints for signals, per-instrument views and the timeframe

pub mod rest;

pub use rest::{router, ApiState};
