// =============================================================================
// Runtime Configuration — engine settings loaded at startup
// =============================================================================
//
// Every tunable lives here: upstream endpoints, universe filters, candle
// windows, batch pacing and the fetch retry policy.  All fields carry
// `#[serde(default)]` so a partial (or empty) JSON file still loads.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::RetryPolicy;
use crate::types::Timeframe;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_ranking_url() -> String {
    "https://api.coingecko.com/api/v3/coins/markets\
     ?vs_currency=usd&order=market_cap_desc&per_page=100&page=1&sparkline=false"
        .to_string()
}

fn default_exchange_info_url() -> String {
    "https://fapi.binance.com/fapi/v1/exchangeInfo".to_string()
}

fn default_klines_url() -> String {
    "https://fapi.binance.com/fapi/v1/klines".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_contract_type() -> String {
    "PERPETUAL".to_string()
}

fn default_stablecoins() -> Vec<String> {
    ["USDT", "USDC", "BUSD", "DAI", "TUSD", "USDP", "GUSD", "USDN"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ema_period() -> usize {
    28
}

fn default_daily_limit() -> u32 {
    10
}

fn default_trend_limit() -> u32 {
    28
}

fn default_fast_limit() -> u32 {
    15
}

fn default_fast_interval() -> Timeframe {
    Timeframe::M1
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_pause_ms() -> u64 {
    150
}

fn default_rate_limit_cooldown_ms() -> u64 {
    5_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_alert_capacity() -> usize {
    20
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the phase scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- HTTP surface -------------------------------------------------------

    /// Address the dashboard API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Background refresh period in seconds; 0 keeps the engine purely
    /// pull-based (a cycle runs per `/api/index-data` request).
    #[serde(default)]
    pub refresh_interval_secs: u64,

    // --- Upstream endpoints -------------------------------------------------

    #[serde(default = "default_ranking_url")]
    pub ranking_url: String,

    #[serde(default = "default_exchange_info_url")]
    pub exchange_info_url: String,

    #[serde(default = "default_klines_url")]
    pub klines_url: String,

    // --- Universe -----------------------------------------------------------

    /// Quote currency of the perpetual contracts considered tradable.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    #[serde(default = "default_contract_type")]
    pub contract_type: String,

    /// Base assets never scored.
    #[serde(default = "default_stablecoins")]
    pub stablecoins: Vec<String>,

    // --- Candle windows -----------------------------------------------------

    /// Smoothing period for the 15m and 5m EMAs.
    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    /// Daily candles scanned for the weekly anchor.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Candles requested for the 15m and 5m series.
    #[serde(default = "default_trend_limit")]
    pub trend_limit: u32,

    /// Candles requested for the fast RSI series.
    #[serde(default = "default_fast_limit")]
    pub fast_limit: u32,

    /// Fast RSI timeframe (1m on Binance futures; 4m where supported).
    #[serde(default = "default_fast_interval")]
    pub fast_interval: Timeframe,

    // --- Pacing -------------------------------------------------------------

    /// Assets processed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Extra pause when the exchange reports weight near its cap.
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    // --- History ------------------------------------------------------------

    /// Maximum alerts retained (most recent first).
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            refresh_interval_secs: 0,
            ranking_url: default_ranking_url(),
            exchange_info_url: default_exchange_info_url(),
            klines_url: default_klines_url(),
            quote_asset: default_quote_asset(),
            contract_type: default_contract_type(),
            stablecoins: default_stablecoins(),
            ema_period: default_ema_period(),
            daily_limit: default_daily_limit(),
            trend_limit: default_trend_limit(),
            fast_limit: default_fast_limit(),
            fast_interval: default_fast_interval(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
            alert_capacity: default_alert_capacity(),
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
            quote_asset = %config.quote_asset,
            batch_size = config.batch_size,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `PHASE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("PHASE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(relay) = lookup("PHASE_CORS_RELAY") {
            let relay = relay.trim().to_string();
            self.retry.cors_relay = (!relay.is_empty()).then_some(relay);
        }
        if let Some(secs) = lookup("PHASE_REFRESH_SECS").and_then(|s| s.trim().parse().ok()) {
            self.refresh_interval_secs = secs;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.ema_period == 0 {
            bail!("ema_period must be at least 1");
        }
        if self.fast_limit < 2 || self.trend_limit < 2 {
            bail!("RSI windows need at least 2 candles");
        }
        if self.alert_capacity == 0 {
            bail!("alert_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
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
        assert_eq!(cfg.quote_asset, "USDT");
        assert_eq!(cfg.contract_type, "PERPETUAL");
        assert_eq!(cfg.stablecoins.len(), 8);
        assert!(cfg.stablecoins.contains(&"USDN".to_string()));
        assert_eq!(cfg.ema_period, 28);
        assert_eq!(cfg.daily_limit, 10);
        assert_eq!(cfg.trend_limit, 28);
        assert_eq!(cfg.fast_limit, 15);
        assert_eq!(cfg.fast_interval, Timeframe::M1);
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.alert_capacity, 20);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.retry.non_fatal_statuses, vec![451]);
        assert!(cfg.ranking_url.contains("per_page=100"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.refresh_interval_secs, 0);
        assert_eq!(cfg.retry.base_delay_ms, 500);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "fast_interval": "4m", "batch_size": 5, "retry": { "max_retries": 4 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.fast_interval, Timeframe::M4);
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.retry.max_retries, 4);
        assert_eq!(cfg.retry.step_delay_ms, 500);
        assert_eq!(cfg.alert_capacity, 20);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("PHASE_BIND_ADDR", "127.0.0.1:9000"),
            ("PHASE_CORS_RELAY", "https://relay.test/?url="),
            ("PHASE_REFRESH_SECS", "120"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.retry.cors_relay.as_deref(), Some("https://relay.test/?url="));
        assert_eq!(cfg.refresh_interval_secs, 120);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        let mut cfg = RuntimeConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.fast_limit = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(RuntimeConfig::load("/definitely/not/here.json").is_err());
    }
}
