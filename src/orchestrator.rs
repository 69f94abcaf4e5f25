// =============================================================================
// Refresh Cycle Orchestrator
// =============================================================================
//
// One cycle:
//   1. Resolve the asset universe (ranking ∩ tradable perpetuals).
//   2. Split it into batches of `batch_size` assets.
//   3. Per batch, run every asset pipeline concurrently:
//        Pending → DataFetched → Scored → Classified
//      Any failure moves the asset to Failed.
//   4. Merge the batch into the StateStore in ranked order (single writer):
//        Classified → Recorded, or a NoTrade row for Failed assets.
//   5. Pause before the next batch; stretch the pause when Binance reports
//      request weight near its cap.
//
// A failing asset never aborts the cycle and never touches its stored state.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::binance::{BinanceFuturesClient, RateLimitTracker};
use crate::coingecko::CoinGeckoClient;
use crate::indicators::IndicatorSet;
use crate::market_data::{Candle, FetchError, Fetcher, Transport};
use crate::runtime_config::RuntimeConfig;
use crate::scoring::compute_score;
use crate::state_store::{AlertEvent, StateStore};
use crate::types::{
    round_to, serialize_phase_or_no_trade, Asset, Phase, Timeframe, PRICE_DECIMALS, SCORE_DECIMALS,
};
use crate::universe::{UniverseFilter, UniverseOutcome, UniverseResolver};

/// Kline requests issued per asset (1d, 15m, 5m, fast).
const REQUESTS_PER_ASSET: usize = 4;

// =============================================================================
// Errors
// =============================================================================

/// Cycle-fatal failure: no universe could be produced at all.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("universe sources unavailable (ranking: {ranking}; exchange: {exchange})")]
    UpstreamUnavailable { ranking: FetchError, exchange: FetchError },
}

// =============================================================================
// Per-asset pipeline stages
// =============================================================================

/// Progress of a single asset through one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStage {
    Pending,
    DataFetched,
    Scored,
    Classified,
    Recorded,
    Failed,
}

impl std::fmt::Display for AssetStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::DataFetched => "data_fetched",
            Self::Scored => "scored",
            Self::Classified => "classified",
            Self::Recorded => "recorded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Successful evaluation of one asset, ready to be recorded.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub indicators: IndicatorSet,
    pub score: f64,
    pub phase: Phase,
}

/// Why an asset pipeline stopped; `stage` is the last stage reached.
#[derive(Debug, Clone)]
pub struct AssetFailure {
    pub stage: AssetStage,
    pub reason: String,
}

impl From<FetchError> for AssetFailure {
    fn from(e: FetchError) -> Self {
        Self {
            stage: AssetStage::Pending,
            reason: e.to_string(),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// One row of the ranking table.  Failed assets carry `null` price/score and
/// the `NoTrade` phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub symbol: String,
    pub price: Option<f64>,
    pub prev_score: Option<f64>,
    pub score: Option<f64>,
    #[serde(serialize_with = "serialize_phase_or_no_trade")]
    pub phase: Option<Phase>,
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub data: Vec<RankingRow>,
    pub alerts: Vec<AlertEvent>,
}

/// Snapshot plus the non-fatal problems met while producing it.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub snapshot: Snapshot,
    pub failed_assets: Vec<String>,
    pub warnings: Vec<String>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Candle windows and pacing for one cycle.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ema_period: usize,
    pub daily_limit: u32,
    pub trend_limit: u32,
    pub fast_limit: u32,
    pub fast_interval: Timeframe,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub rate_limit_cooldown: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            ema_period: config.ema_period,
            daily_limit: config.daily_limit,
            trend_limit: config.trend_limit,
            fast_limit: config.fast_limit,
            fast_interval: config.fast_interval,
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
        }
    }
}

/// Sequences universe resolution, per-asset evaluation and state recording.
#[derive(Debug)]
pub struct Orchestrator {
    universe: UniverseResolver,
    exchange: BinanceFuturesClient,
    rate_limit: Arc<RateLimitTracker>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        config: &RuntimeConfig,
        transport: Arc<dyn Transport>,
        rate_limit: Arc<RateLimitTracker>,
    ) -> Self {
        let fetcher = Fetcher::new(transport, config.retry.clone());
        let exchange = BinanceFuturesClient::new(
            fetcher.clone(),
            config.exchange_info_url.clone(),
            config.klines_url.clone(),
        );
        let ranking = CoinGeckoClient::new(fetcher, config.ranking_url.clone());
        let universe = UniverseResolver::new(ranking, exchange.clone(), UniverseFilter::from_config(config));

        Self {
            universe,
            exchange,
            rate_limit,
            settings: PipelineSettings::from_config(config),
        }
    }

    /// Run one full cycle against `store`.
    pub async fn run_cycle(&self, store: &StateStore) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let assets = match self.universe.resolve().await {
            UniverseOutcome::Resolved(assets) => assets,
            UniverseOutcome::Degraded { failed_source, error } => {
                warn!(source = failed_source, error = %error, "universe source unavailable — empty universe this cycle");
                report
                    .warnings
                    .push(format!("{failed_source} unavailable: {error}"));
                Vec::new()
            }
            UniverseOutcome::Unavailable { ranking, exchange } => {
                return Err(CycleError::UpstreamUnavailable { ranking, exchange });
            }
        };

        let mut rows = Vec::with_capacity(assets.len());
        for (index, batch) in assets.chunks(self.settings.batch_size).enumerate() {
            if index > 0 {
                self.pace(batch.len()).await;
            }

            let outcomes = join_all(batch.iter().map(|asset| self.evaluate_asset(asset))).await;

            for (asset, outcome) in batch.iter().zip(outcomes) {
                if outcome.is_err() {
                    report.failed_assets.push(asset.symbol.clone());
                }
                rows.push(Self::record(store, asset, outcome));
            }
        }

        info!(
            assets = rows.len(),
            failed = report.failed_assets.len(),
            tracked = store.tracked_symbols(),
            "refresh cycle complete"
        );

        report.snapshot = Snapshot {
            data: rows,
            alerts: store.alerts(),
        };
        Ok(report)
    }

    /// Fetch, compute and classify one asset.  Never touches the store.
    ///
    /// An asset whose four series all came back empty (every request
    /// geo-blocked with 451) is not scored from nothing: it fails at
    /// `DataFetched` and is published as NoTrade.  A 451 on a single series
    /// stays a non-error and only silences the rules fed by that series.
    pub async fn evaluate_asset(&self, asset: &Asset) -> Result<Evaluation, AssetFailure> {
        let s = &self.settings;
        let pair = asset.trading_pair.as_str();

        let daily = self.exchange.get_klines(pair, Timeframe::D1, s.daily_limit).await?;
        let m15 = self.exchange.get_klines(pair, Timeframe::M15, s.trend_limit).await?;
        let m5 = self.exchange.get_klines(pair, Timeframe::M5, s.trend_limit).await?;
        let fast = self.exchange.get_klines(pair, s.fast_interval, s.fast_limit).await?;

        let series: [&[Candle]; 4] = [&daily, &m15, &m5, &fast];
        if series.iter().all(|c| c.is_empty()) {
            return Err(AssetFailure {
                stage: AssetStage::DataFetched,
                reason: "every candle series came back empty".to_string(),
            });
        }
        debug!(symbol = %asset.symbol, stage = %AssetStage::DataFetched, "candles fetched");

        let indicators = IndicatorSet::compute(&daily, &m15, &m5, &fast, s.ema_period);
        let score = compute_score(asset.reference_price, &indicators);
        debug!(symbol = %asset.symbol, stage = %AssetStage::Scored, score, "asset scored");

        let phase = Phase::classify(score);
        debug!(symbol = %asset.symbol, stage = %AssetStage::Classified, phase = %phase, "asset classified");

        Ok(Evaluation {
            indicators,
            score,
            phase,
        })
    }

    /// Apply an outcome to the store and build the ranking row.
    fn record(store: &StateStore, asset: &Asset, outcome: Result<Evaluation, AssetFailure>) -> RankingRow {
        let prev_score = store.previous(&asset.symbol).map(|s| round_to(s.last_score, SCORE_DECIMALS));

        match outcome {
            Ok(eval) => {
                store.record(&asset.symbol, eval.score, eval.phase, asset.reference_price);
                debug!(
                    symbol = %asset.symbol,
                    stage = %AssetStage::Recorded,
                    indicators = ?eval.indicators,
                    "asset recorded"
                );
                RankingRow {
                    symbol: asset.symbol.clone(),
                    price: Some(round_to(asset.reference_price, PRICE_DECIMALS)),
                    prev_score,
                    score: Some(round_to(eval.score, SCORE_DECIMALS)),
                    phase: Some(eval.phase),
                }
            }
            Err(failure) => {
                warn!(
                    symbol = %asset.symbol,
                    stage = %AssetStage::Failed,
                    last_stage = %failure.stage,
                    error = %failure.reason,
                    "asset pipeline failed — marked NoTrade"
                );
                RankingRow {
                    symbol: asset.symbol.clone(),
                    price: None,
                    prev_score,
                    score: None,
                    phase: None,
                }
            }
        }
    }

    /// Inter-batch pause, extended while the exchange weight is near its cap.
    async fn pace(&self, next_batch_len: usize) {
        let weight = (next_batch_len * REQUESTS_PER_ASSET) as u32;
        if self.rate_limit.should_throttle() || !self.rate_limit.can_send_request(weight) {
            warn!(
                used_weight = self.rate_limit.used_weight(),
                cooldown_ms = self.settings.rate_limit_cooldown.as_millis() as u64,
                "request weight near limit — cooling down"
            );
            tokio::time::sleep(self.settings.rate_limit_cooldown).await;
            self.rate_limit.reset_1m_weight();
        }
        tokio::time::sleep(self.settings.batch_pause).await;
    }
}
