// =============================================================================
// Test doubles shared by the unit tests
// =============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::market_data::fetcher::TransportResponse;
use crate::market_data::{RetryPolicy, Transport};
use crate::runtime_config::RuntimeConfig;

type Handler = Box<dyn Fn(&str) -> anyhow::Result<TransportResponse> + Send + Sync>;

/// Scripted transport: queued responses are served first, then `handler`.
pub struct FakeTransport {
    handler: Handler,
    script: Mutex<VecDeque<anyhow::Result<TransportResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&str) -> anyhow::Result<TransportResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push_script(&self, responses: Vec<anyhow::Result<TransportResponse>>) {
        self.script.lock().extend(responses);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|u| u.contains(needle)).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> anyhow::Result<TransportResponse> {
        self.calls.lock().push(url.to_string());
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        (self.handler)(url)
    }
}

pub fn json_response(body: Value) -> anyhow::Result<TransportResponse> {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub fn status_response(status: u16) -> anyhow::Result<TransportResponse> {
    Ok(TransportResponse {
        status,
        body: json!({ "code": -1, "msg": "error" }).to_string(),
    })
}

pub fn zero_delay_policy() -> RetryPolicy {
    RetryPolicy {
        base_delay_ms: 0,
        step_delay_ms: 0,
        ..RetryPolicy::default()
    }
}

/// Config pointing at `.test` hosts with every pause disabled.
pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        ranking_url: "https://cg.test/api/v3/coins/markets".into(),
        exchange_info_url: "https://fapi.test/fapi/v1/exchangeInfo".into(),
        klines_url: "https://fapi.test/fapi/v1/klines".into(),
        batch_pause_ms: 0,
        rate_limit_cooldown_ms: 0,
        retry: zero_delay_policy(),
        ..RuntimeConfig::default()
    }
}

// -----------------------------------------------------------------------------
// Payload builders
// -----------------------------------------------------------------------------

/// CoinGecko `coins/markets` payload from `(symbol, price)` pairs.
pub fn ranking_payload(coins: &[(&str, f64)]) -> Value {
    Value::Array(
        coins
            .iter()
            .map(|(s, p)| json!({ "symbol": s, "current_price": p }))
            .collect(),
    )
}

/// Binance `exchangeInfo` payload with USDT perpetuals for `bases`.
pub fn exchange_info_payload(bases: &[&str]) -> Value {
    let symbols: Vec<Value> = bases
        .iter()
        .map(|b| {
            json!({
                "symbol": format!("{b}USDT"),
                "baseAsset": b,
                "quoteAsset": "USDT",
                "contractType": "PERPETUAL",
                "status": "TRADING"
            })
        })
        .collect();
    json!({ "symbols": symbols })
}

/// Klines payload with flat candles closing at `close`, one day apart,
/// starting Monday 2024-01-01 UTC.
pub fn flat_klines_payload(close: f64, count: usize) -> Value {
    const MONDAY_2024_01_01: i64 = 1_704_067_200_000;
    const DAY_MS: i64 = 86_400_000;
    Value::Array(
        (0..count)
            .map(|i| {
                json!([
                    MONDAY_2024_01_01 + i as i64 * DAY_MS,
                    close.to_string(),
                    (close + 1.0).to_string(),
                    (close - 1.0).to_string(),
                    close.to_string(),
                    "0"
                ])
            })
            .collect(),
    )
}

/// Klines payload whose closes follow `closes` exactly.
pub fn klines_from_closes(closes: &[f64]) -> Value {
    Value::Array(
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!([
                    i as i64 * 60_000,
                    c.to_string(),
                    (c + 1.0).to_string(),
                    (c - 1.0).to_string(),
                    c.to_string(),
                    "0"
                ])
            })
            .collect(),
    )
}
