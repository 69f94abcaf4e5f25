// =============================================================================
// Asset Universe Resolver
// =============================================================================
//
// universe = ranked coins ∩ bases with a live perpetual in the quote currency
//            − stablecoin denylist
//
// Ranking order is preserved.  Structurally invalid payloads resolve to an
// empty universe rather than failing the cycle.
// =============================================================================

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::binance::BinanceFuturesClient;
use crate::coingecko::CoinGeckoClient;
use crate::market_data::candles::parse_str_f64;
use crate::market_data::FetchError;
use crate::runtime_config::RuntimeConfig;
use crate::types::Asset;

/// Filters applied when intersecting the two upstream lists.
#[derive(Debug, Clone)]
pub struct UniverseFilter {
    pub quote_asset: String,
    pub contract_type: String,
    pub stablecoins: HashSet<String>,
}

impl UniverseFilter {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            quote_asset: config.quote_asset.to_uppercase(),
            contract_type: config.contract_type.to_uppercase(),
            stablecoins: config.stablecoins.iter().map(|s| s.to_uppercase()).collect(),
        }
    }
}

/// Base assets with an actively trading perpetual quoted in `quote_asset`.
pub fn tradable_bases(exchange_info: &Value, filter: &UniverseFilter) -> HashSet<String> {
    let Some(symbols) = exchange_info.get("symbols").and_then(Value::as_array) else {
        warn!("exchangeInfo payload has no 'symbols' list — no tradable bases");
        return HashSet::new();
    };

    symbols
        .iter()
        .filter(|s| {
            s.get("contractType")
                .and_then(Value::as_str)
                .is_some_and(|ct| ct.eq_ignore_ascii_case(&filter.contract_type))
        })
        .filter(|s| match s.get("status").and_then(Value::as_str) {
            Some(status) => status == "TRADING",
            None => true,
        })
        .filter(|s| match s.get("quoteAsset").and_then(Value::as_str) {
            Some(quote) => quote.eq_ignore_ascii_case(&filter.quote_asset),
            None => s
                .get("symbol")
                .and_then(Value::as_str)
                .is_some_and(|sym| sym.to_uppercase().ends_with(&filter.quote_asset)),
        })
        .filter_map(|s| s.get("baseAsset").and_then(Value::as_str))
        .map(str::to_uppercase)
        .collect()
}

/// Intersect the ranked list with the tradable set, keeping ranked order.
pub fn resolve_assets(ranking: &Value, exchange_info: &Value, filter: &UniverseFilter) -> Vec<Asset> {
    let Some(coins) = ranking.as_array() else {
        warn!("ranking payload is not a list — empty universe");
        return Vec::new();
    };

    let tradable = tradable_bases(exchange_info, filter);
    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    for coin in coins {
        let Some(symbol) = coin.get("symbol").and_then(Value::as_str) else {
            continue;
        };
        let symbol = symbol.to_uppercase();
        if symbol.is_empty() || filter.stablecoins.contains(&symbol) || !tradable.contains(&symbol) {
            continue;
        }
        let Some(price) = coin.get("current_price").and_then(parse_str_f64) else {
            debug!(symbol = %symbol, "ranked coin without a usable price — skipped");
            continue;
        };
        if !seen.insert(symbol.clone()) {
            continue;
        }
        assets.push(Asset::new(symbol, &filter.quote_asset, price));
    }

    assets
}

/// Why a universe could not be built.
#[derive(Debug)]
pub enum UniverseOutcome {
    /// Both sources answered (payloads may still be malformed).
    Resolved(Vec<Asset>),
    /// Exactly one source failed after retries; the universe is empty.
    Degraded { failed_source: &'static str, error: FetchError },
    /// Neither source could be reached.
    Unavailable { ranking: FetchError, exchange: FetchError },
}

/// Fetches both upstream lists and resolves the universe.
#[derive(Debug, Clone)]
pub struct UniverseResolver {
    ranking: CoinGeckoClient,
    exchange: BinanceFuturesClient,
    filter: UniverseFilter,
}

impl UniverseResolver {
    pub fn new(ranking: CoinGeckoClient, exchange: BinanceFuturesClient, filter: UniverseFilter) -> Self {
        Self {
            ranking,
            exchange,
            filter,
        }
    }

    pub async fn resolve(&self) -> UniverseOutcome {
        let (ranking, info) = tokio::join!(self.ranking.ranked_markets(), self.exchange.exchange_info());

        match (ranking, info) {
            (Ok(ranking), Ok(info)) => {
                let assets = resolve_assets(&ranking, &info, &self.filter);
                info!(count = assets.len(), "asset universe resolved");
                UniverseOutcome::Resolved(assets)
            }
            (Err(error), Ok(_)) => UniverseOutcome::Degraded {
                failed_source: "ranking",
                error,
            },
            (Ok(_), Err(error)) => UniverseOutcome::Degraded {
                failed_source: "exchangeInfo",
                error,
            },
            (Err(ranking), Err(exchange)) => UniverseOutcome::Unavailable { ranking, exchange },
        }
    }
}
