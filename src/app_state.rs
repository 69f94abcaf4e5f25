// =============================================================================
// Central Application State — Phase Index Engine
// =============================================================================
//
// Ties the long-lived pieces together for the HTTP layer and the optional
// background refresh loop: configuration, the StateStore, the orchestrator,
// the last published snapshot and a bounded error log.
//
// Thread safety:
//   - tokio::sync::Mutex serialises refresh cycles (held across awaits), so
//     two concurrent `/api/index-data` requests never interleave writes to
//     the StateStore.
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the published snapshot and error log.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info};

use crate::binance::RateLimitTracker;
use crate::market_data::Transport;
use crate::orchestrator::{CycleError, Orchestrator, Snapshot};
use crate::runtime_config::RuntimeConfig;
use crate::state_store::StateStore;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the error log endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Optional machine-readable code (e.g. `upstream_unavailable`).
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Snapshot plus when it was produced.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    pub snapshot: Snapshot,
    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented after every completed cycle and every recorded error.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: RuntimeConfig,

    // ── Engine ──────────────────────────────────────────────────────────
    pub store: Arc<StateStore>,
    pub orchestrator: Orchestrator,
    pub rate_limit: Arc<RateLimitTracker>,
    cycle_lock: tokio::sync::Mutex<()>,

    // ── Published output ────────────────────────────────────────────────
    pub last_snapshot: RwLock<Option<PublishedSnapshot>>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the state from `config`, issuing every upstream request through
    /// `transport`.
    pub fn new(config: RuntimeConfig, transport: Arc<dyn Transport>, rate_limit: Arc<RateLimitTracker>) -> Self {
        let orchestrator = Orchestrator::new(&config, transport, rate_limit.clone());
        let store = Arc::new(StateStore::new(config.alert_capacity));

        Self {
            state_version: AtomicU64::new(0),
            runtime_config: config,
            store,
            orchestrator,
            rate_limit,
            cycle_lock: tokio::sync::Mutex::new(()),
            last_snapshot: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Run one refresh cycle and publish its snapshot.
    ///
    /// Cycles are serialised: a caller arriving mid-cycle waits for the
    /// running one to finish, then runs its own.
    pub async fn refresh(&self) -> Result<Snapshot, CycleError> {
        let _guard = self.cycle_lock.lock().await;

        match self.orchestrator.run_cycle(&self.store).await {
            Ok(report) => {
                for warning in report.warnings {
                    self.push_error_with_code(warning, Some("universe_degraded".to_string()));
                }
                if !report.failed_assets.is_empty() {
                    self.push_error_with_code(
                        format!("NoTrade this cycle: {}", report.failed_assets.join(", ")),
                        Some("asset_failed".to_string()),
                    );
                }

                *self.last_snapshot.write() = Some(PublishedSnapshot {
                    snapshot: report.snapshot.clone(),
                    completed_at: Utc::now(),
                });
                let version = self.increment_version();
                info!(
                    version,
                    rows = report.snapshot.data.len(),
                    alerts = report.snapshot.alerts.len(),
                    "snapshot published"
                );
                Ok(report.snapshot)
            }
            Err(e) => {
                error!(error = %e, "refresh cycle failed");
                self.push_error_with_code(e.to_string(), Some("upstream_unavailable".to_string()));
                Err(e)
            }
        }
    }

    /// Most recently published snapshot, if any cycle has completed.
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.last_snapshot.read().as_ref().map(|p| p.snapshot.clone())
    }

    pub fn last_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.last_snapshot.read().as_ref().map(|p| p.completed_at)
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }
}
