// =============================================================================
// Rate-Limit Tracker — monitors Binance futures request weight
// =============================================================================
//
// Binance USDⓈ-M futures allow 2400 request weight per minute per IP.  Every
// response carries `X-MBX-USED-WEIGHT-1M`; the tracker keeps the latest value
// in an atomic so the orchestrator can stretch its inter-batch pause before
// the exchange starts answering 429/418.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Weight at which the orchestrator adds a cooldown between batches.
pub const WEIGHT_SOFT_LIMIT: u32 = 1800;
/// Weight we refuse to exceed.
pub const WEIGHT_HARD_LIMIT: u32 = 2200;

/// Thread-safe request-weight tracker.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
}

/// Serialisable view of the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
        }
    }

    /// Update the weight counter from Binance response headers.  Responses
    /// from other hosts simply lack the header and are ignored.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record_weight(w);
    }

    /// Store the latest used weight reported by the exchange.
    pub fn record_weight(&self, w: u32) {
        let prev = self.used_weight_1m.swap(w, Ordering::Relaxed);
        if w >= WEIGHT_SOFT_LIMIT && prev < WEIGHT_SOFT_LIMIT {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "rate-limit weight updated from header");
    }

    pub fn used_weight(&self) -> u32 {
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    /// `true` once the soft limit is reached and callers should slow down.
    pub fn should_throttle(&self) -> bool {
        self.used_weight() >= WEIGHT_SOFT_LIMIT
    }

    /// `true` if `weight` more can be spent without crossing the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        let current = self.used_weight();
        let allowed = current + weight <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "batch would exceed rate-limit"
            );
        }
        allowed
    }

    /// Reset the 1-minute weight counter (the exchange window has rolled).
    pub fn reset_1m_weight(&self) {
        self.used_weight_1m.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight(),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight())
            .finish()
    }
}
