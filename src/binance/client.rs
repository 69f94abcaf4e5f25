// =============================================================================
// Binance USDⓈ-M Futures REST Client — public market data only
// =============================================================================
//
// Two unsigned endpoints are used:
//   GET /fapi/v1/exchangeInfo          tradable instrument descriptors
//   GET /fapi/v1/klines                candle tuples per symbol/interval
//
// Every request goes through the shared `Fetcher`, so retries, 451 handling
// and the optional CORS relay apply uniformly.
// =============================================================================

use serde_json::Value;
use tracing::{debug, instrument};

use crate::market_data::{parse_klines, Candle, FetchError, Fetcher};
use crate::types::Timeframe;

/// Binance futures public market-data client.
#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    fetcher: Fetcher,
    exchange_info_url: String,
    klines_url: String,
}

impl BinanceFuturesClient {
    pub fn new(
        fetcher: Fetcher,
        exchange_info_url: impl Into<String>,
        klines_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            exchange_info_url: exchange_info_url.into(),
            klines_url: klines_url.into(),
        }
    }

    /// GET /fapi/v1/exchangeInfo — raw payload, filtered by the resolver.
    #[instrument(skip(self), name = "binance::exchange_info")]
    pub async fn exchange_info(&self) -> Result<Value, FetchError> {
        self.fetcher.fetch(&self.exchange_info_url).await
    }

    /// Build the klines URL for `pair` at `interval`.
    pub fn klines_request_url(&self, pair: &str, interval: Timeframe, limit: u32) -> String {
        format!(
            "{}?symbol={}&interval={}&limit={}",
            self.klines_url, pair, interval, limit
        )
    }

    /// GET /fapi/v1/klines — decoded candles, oldest first.
    ///
    /// A geo-blocked (451) request yields an empty vector.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        pair: &str,
        interval: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let url = self.klines_request_url(pair, interval, limit);
        let body = self.fetcher.fetch(&url).await?;
        let candles = parse_klines(&body);
        debug!(pair, %interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}
