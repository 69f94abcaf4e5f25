pub mod candles;
pub mod fetcher;

// Re-export for convenient access (e.g. `use crate::market_data::Candle`).
pub use candles::{parse_klines, Candle};
pub use fetcher::{FetchError, Fetcher, ReqwestTransport, RetryPolicy, Transport};
