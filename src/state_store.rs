// =============================================================================
// State Store — process-lifetime phase memory and alert history
// =============================================================================
//
// Holds, for every symbol ever scored, the last score and phase, plus a
// bounded most-recent-first log of phase transitions.  Nothing is persisted:
// a restart starts from an empty store and no alert can fire for a symbol
// until it has been observed twice.
//
// Thread safety:
//   - parking_lot::Mutex around symbol map and alert log together, so the
//     read-compare-write of a symbol and the alert push it may cause are one
//     critical section.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::types::{round_to, Phase, PRICE_DECIMALS, SCORE_DECIMALS};

/// Default number of alerts retained.
pub const DEFAULT_ALERT_CAPACITY: usize = 20;

/// Last observation stored for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolState {
    pub last_score: f64,
    pub last_phase: Phase,
    pub updated_at: DateTime<Utc>,
}

/// A recorded phase transition.  Price and score are rounded the same way
/// as ranking rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// RFC 3339 UTC timestamp.
    pub time: String,
    pub symbol: String,
    pub old_phase: Phase,
    pub new_phase: Phase,
    pub price: f64,
    pub score: f64,
}

// -----------------------------------------------------------------------------
// AlertLog
// -----------------------------------------------------------------------------

/// Bounded alert history, newest at the front.
#[derive(Debug, Clone)]
pub struct AlertLog {
    events: VecDeque<AlertEvent>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest entry on overflow.
    pub fn push(&mut self, event: AlertEvent) {
        self.events.push_front(event);
        while self.events.len() > self.capacity {
            self.events.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.events.iter().cloned().collect()
    }
}

// -----------------------------------------------------------------------------
// StateStore
// -----------------------------------------------------------------------------

struct Inner {
    symbols: HashMap<String, SymbolState>,
    alerts: AlertLog,
}

/// Symbol → last score/phase plus the alert log.
///
/// Constructed once at startup and shared via `Arc`; tests build a fresh one.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new(alert_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                symbols: HashMap::new(),
                alerts: AlertLog::new(alert_capacity),
            }),
        }
    }

    /// Stored observation for `symbol`, if any.
    pub fn previous(&self, symbol: &str) -> Option<SymbolState> {
        self.inner.lock().symbols.get(symbol).cloned()
    }

    /// Store the new observation for `symbol` and emit an alert when a prior
    /// phase exists and differs from `phase`.
    pub fn record(&self, symbol: &str, score: f64, phase: Phase, price: f64) -> Option<AlertEvent> {
        self.record_at(symbol, score, phase, price, Utc::now())
    }

    pub fn record_at(
        &self,
        symbol: &str,
        score: f64,
        phase: Phase,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let mut inner = self.inner.lock();

        let previous = inner.symbols.insert(
            symbol.to_string(),
            SymbolState {
                last_score: score,
                last_phase: phase,
                updated_at: now,
            },
        );

        let old_phase = previous.map(|p| p.last_phase)?;
        if old_phase == phase {
            return None;
        }

        let event = AlertEvent {
            time: now.to_rfc3339(),
            symbol: symbol.to_string(),
            old_phase,
            new_phase: phase,
            price: round_to(price, PRICE_DECIMALS),
            score: round_to(score, SCORE_DECIMALS),
        };
        inner.alerts.push(event.clone());

        info!(
            symbol,
            old_phase = %old_phase,
            new_phase = %phase,
            score,
            "phase transition"
        );
        Some(event)
    }

    /// Alert history, most recent first.
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.inner.lock().alerts.to_vec()
    }

    /// Number of symbols with a stored observation.
    pub fn tracked_symbols(&self) -> usize {
        self.inner.lock().symbols.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StateStore")
            .field("symbols", &inner.symbols.len())
            .field("alerts", &inner.alerts.len())
            .finish()
    }
}
