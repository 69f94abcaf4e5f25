// =============================================================================
// CoinGecko Market-Cap Ranking Source
// =============================================================================

use serde_json::Value;
use tracing::instrument;

use crate::market_data::{FetchError, Fetcher};

/// Client for the `coins/markets` ranking endpoint.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    fetcher: Fetcher,
    markets_url: String,
}

impl CoinGeckoClient {
    pub fn new(fetcher: Fetcher, markets_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            markets_url: markets_url.into(),
        }
    }

    /// Ranked `[{symbol, current_price, ...}]`, highest market cap first.
    #[instrument(skip(self), name = "coingecko::ranked_markets")]
    pub async fn ranked_markets(&self) -> Result<Value, FetchError> {
        self.fetcher.fetch(&self.markets_url).await
    }
}
