// =============================================================================
// Runtime Configuration — scanner settings with atomic save
// =============================================================================
//
// Every tunable of the scanner lives here: the active timeframe, universe
// selection, history sizing, feed pacing and classifier thresholds.
//
// Persistence uses an atomic tmp + rename pattern.  All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{EngineSettings, DEFAULT_MIN_HISTORY};
use crate::market_data::candle_series::DEFAULT_CAPACITY;
use crate::signals::signal::DEFAULT_FRESHNESS_WINDOW_MS;
use crate::signals::ClassifierParams;
use crate::types::Timeframe;

pub const DEFAULT_CONFIG_PATH: &str = "crosswatch.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_excluded_fragments() -> Vec<String> {
    ["UP", "DOWN", "BULL", "BEAR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_min_history() -> usize {
    DEFAULT_MIN_HISTORY
}

fn default_backfill_limit() -> u32 {
    100
}

fn default_backfill_batch_size() -> usize {
    10
}

fn default_backfill_batch_delay_ms() -> u64 {
    100
}

fn default_streams_per_connection() -> usize {
    10
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_ticker_refresh_secs() -> u64 {
    300
}

fn default_history_refresh_secs() -> u64 {
    300
}

fn default_freshness_window_ms() -> i64 {
    DEFAULT_FRESHNESS_WINDOW_MS
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Candle interval every instrument is classified on.
    #[serde(default)]
    pub timeframe: Timeframe,

    /// Explicit instrument list.  Empty means discover from exchange info.
    #[serde(default)]
    pub symbols: Vec<String>,

    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    /// Leveraged-token markers; any symbol containing one is skipped.
    #[serde(default = "default_excluded_fragments")]
    pub excluded_symbol_fragments: Vec<String>,

    // --- History ------------------------------------------------------------
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_min_history")]
    pub min_history: usize,

    // --- Feed pacing --------------------------------------------------------
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: u32,

    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,

    #[serde(default = "default_backfill_batch_delay_ms")]
    pub backfill_batch_delay_ms: u64,

    #[serde(default = "default_streams_per_connection")]
    pub streams_per_connection: usize,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_ticker_refresh_secs")]
    pub ticker_refresh_secs: u64,

    /// Full kline history refetch period; 0 disables it.
    #[serde(default = "default_history_refresh_secs")]
    pub history_refresh_secs: u64,

    // --- Presentation -------------------------------------------------------
    /// A signal younger than this is reported as active.
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: i64,

    #[serde(default)]
    pub classifier: ClassifierParams,

    // --- Endpoints ----------------------------------------------------------
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            symbols: Vec::new(),
            quote_asset: default_quote_asset(),
            excluded_symbol_fragments: default_excluded_fragments(),
            history_capacity: default_history_capacity(),
            min_history: default_min_history(),
            backfill_limit: default_backfill_limit(),
            backfill_batch_size: default_backfill_batch_size(),
            backfill_batch_delay_ms: default_backfill_batch_delay_ms(),
            streams_per_connection: default_streams_per_connection(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            ticker_refresh_secs: default_ticker_refresh_secs(),
            history_refresh_secs: default_history_refresh_secs(),
            freshness_window_ms: default_freshness_window_ms(),
            classifier: ClassifierParams::default(),
            bind_addr: default_bind_addr(),
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            timeframe = %config.timeframe,
            symbols = config.symbols.len(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `CROSSWATCH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup.  Unparseable values are logged
    /// and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CROSSWATCH_SYMBOLS") {
            let symbols: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }

        if let Some(raw) = lookup("CROSSWATCH_TIMEFRAME") {
            match raw.parse::<Timeframe>() {
                Ok(tf) => self.timeframe = tf,
                Err(e) => warn!(error = %e, "ignoring CROSSWATCH_TIMEFRAME"),
            }
        }

        if let Some(raw) = lookup("CROSSWATCH_BIND_ADDR") {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.bind_addr = raw.to_string();
            }
        }
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_history < 2 {
            bail!("min_history must be at least 2 (got {})", self.min_history);
        }
        if self.history_capacity < self.min_history {
            bail!(
                "history_capacity ({}) must be >= min_history ({})",
                self.history_capacity,
                self.min_history
            );
        }
        if self.backfill_batch_size == 0 {
            bail!("backfill_batch_size must be positive");
        }
        if self.streams_per_connection == 0 {
            bail!("streams_per_connection must be positive");
        }
        if self.backfill_limit == 0 {
            bail!("backfill_limit must be positive");
        }
        let ClassifierParams {
            touch_threshold,
            near_cross_threshold,
        } = self.classifier;
        if !(touch_threshold.is_finite() && touch_threshold > 0.0) {
            bail!("classifier.touch_threshold must be positive (got {touch_threshold})");
        }
        if !(near_cross_threshold.is_finite() && near_cross_threshold > 0.0) {
            bail!("classifier.near_cross_threshold must be positive (got {near_cross_threshold})");
        }
        if self.freshness_window_ms <= 0 {
            bail!("freshness_window_ms must be positive");
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            history_capacity: self.history_capacity,
            min_history: self.min_history,
            classifier: self.classifier,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.timeframe, Timeframe::FiveMinutes);
        assert!(cfg.symbols.is_empty());
        assert_eq!(cfg.quote_asset, "USDT");
        assert_eq!(cfg.excluded_symbol_fragments, vec!["UP", "DOWN", "BULL", "BEAR"]);
        assert_eq!(cfg.history_capacity, 200);
        assert_eq!(cfg.min_history, 50);
        assert_eq!(cfg.backfill_limit, 100);
        assert_eq!(cfg.streams_per_connection, 10);
        assert_eq!(cfg.history_refresh_secs, 300);
        assert_eq!(cfg.freshness_window_ms, 60_000);
        assert!((cfg.classifier.touch_threshold - 0.002).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "timeframe": "1h", "symbols": ["ETHUSDT"], "classifier": { "touch_threshold": 0.001 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.timeframe, Timeframe::OneHour);
        assert_eq!(cfg.symbols, vec!["ETHUSDT"]);
        assert!((cfg.classifier.touch_threshold - 0.001).abs() < f64::EPSILON);
        assert!((cfg.classifier.near_cross_threshold - 0.002).abs() < f64::EPSILON);
        assert_eq!(cfg.history_capacity, 200);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("crosswatch-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("crosswatch.json");

        let mut cfg = RuntimeConfig::default();
        cfg.timeframe = Timeframe::FifteenMinutes;
        cfg.symbols = vec!["BTCUSDT".into()];
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/definitely/not/here/crosswatch.json").is_err());
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("CROSSWATCH_SYMBOLS", " btcusdt, ETHUSDT ,,"),
            ("CROSSWATCH_TIMEFRAME", "3h"),
            ("CROSSWATCH_BIND_ADDR", "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(cfg.timeframe, Timeframe::FiveMinutes);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");

        cfg.apply_overrides(|k| (k == "CROSSWATCH_TIMEFRAME").then(|| "1d".to_string()));
        assert_eq!(cfg.timeframe, Timeframe::OneDay);
    }

    #[test]
    fn validate_rejects_inconsistent_settings() {
        let mut cfg = RuntimeConfig::default();
        cfg.history_capacity = 40;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.min_history = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.backfill_batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.classifier.near_cross_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn engine_settings_mirror_config() {
        let mut cfg = RuntimeConfig::default();
        cfg.history_capacity = 300;
        let settings = cfg.engine_settings();
        assert_eq!(settings.history_capacity, 300);
        assert_eq!(settings.min_history, 50);
        assert_eq!(settings.classifier, cfg.classifier);
    }
}
