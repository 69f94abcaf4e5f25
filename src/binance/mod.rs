pub mod client;
pub mod rate_limit;

pub use client::BinanceFuturesClient;
pub use rate_limit::RateLimitTracker;
