// =============================================================================
// Shared types used across the phase scoring engine
// =============================================================================

use serde::{Deserialize, Serialize, Serializer};

/// A tradable asset resolved for the current refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Uppercase base asset, e.g. "BTC".
    pub symbol: String,
    /// Exchange pair, e.g. "BTCUSDT".
    pub trading_pair: String,
    /// Price reported by the ranking source.
    pub reference_price: f64,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, quote: &str, reference_price: f64) -> Self {
        let symbol = symbol.into().to_uppercase();
        Self {
            trading_pair: format!("{symbol}{quote}"),
            symbol,
            reference_price,
        }
    }
}

/// Decimal places for published prices.
pub const PRICE_DECIMALS: i32 = 6;
/// Decimal places for published scores.
pub const SCORE_DECIMALS: i32 = 2;

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// Phase
// =============================================================================

/// Market phase derived from the composite score.
///
/// Variants are declared in severity order so the derived `Ord` ranks
/// `Oversold` lowest and `Overbought` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "Oversold")]
    Oversold,
    #[serde(rename = "Bearish Incline")]
    BearishIncline,
    #[serde(rename = "Accumulation")]
    Accumulation,
    #[serde(rename = "Bullish Incline")]
    BullishIncline,
    #[serde(rename = "Overbought")]
    Overbought,
}

/// Label shown for assets whose pipeline failed this cycle.
pub const NO_TRADE_LABEL: &str = "NoTrade";

impl Phase {
    /// Classify a score. Boundaries are half-open: 4.9, 6.0 and 8.1 belong to
    /// the bracket above them.
    pub fn classify(score: f64) -> Self {
        if score <= 3.0 {
            Self::Oversold
        } else if score < 4.9 {
            Self::BearishIncline
        } else if score < 6.0 {
            Self::Accumulation
        } else if score < 8.1 {
            Self::BullishIncline
        } else {
            Self::Overbought
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Oversold => "Oversold",
            Self::BearishIncline => "Bearish Incline",
            Self::Accumulation => "Accumulation",
            Self::BullishIncline => "Bullish Incline",
            Self::Overbought => "Overbought",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Serialise a missing phase as the `NoTrade` sentinel.
pub fn serialize_phase_or_no_trade<S>(phase: &Option<Phase>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match phase {
        Some(p) => serializer.serialize_str(p.label()),
        None => serializer.serialize_str(NO_TRADE_LABEL),
    }
}

// =============================================================================
// Timeframe
// =============================================================================

/// Kline intervals requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "4m")]
    M4,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M4 => "4m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_bracket_boundaries() {
        assert_eq!(Phase::classify(1.0), Phase::Oversold);
        assert_eq!(Phase::classify(3.0), Phase::Oversold);
        assert_eq!(Phase::classify(3.5), Phase::BearishIncline);
        assert_eq!(Phase::classify(4.89), Phase::BearishIncline);
        assert_eq!(Phase::classify(4.9), Phase::Accumulation);
        assert_eq!(Phase::classify(5.99), Phase::Accumulation);
        assert_eq!(Phase::classify(6.0), Phase::BullishIncline);
        assert_eq!(Phase::classify(8.0), Phase::BullishIncline);
        assert_eq!(Phase::classify(8.1), Phase::Overbought);
        assert_eq!(Phase::classify(10.0), Phase::Overbought);
    }

    #[test]
    fn phases_order_by_severity_not_label() {
        assert!(Phase::Oversold < Phase::BearishIncline);
        assert!(Phase::BearishIncline < Phase::Accumulation);
        assert!(Phase::Accumulation < Phase::BullishIncline);
        assert!(Phase::BullishIncline < Phase::Overbought);
        // Alphabetically "Accumulation" < "Bearish Incline", severity says otherwise.
        assert!(Phase::BearishIncline < Phase::Accumulation);
    }

    #[test]
    fn phase_serialises_as_label() {
        let json = serde_json::to_string(&Phase::BullishIncline).unwrap();
        assert_eq!(json, "\"Bullish Incline\"");
        let back: Phase = serde_json::from_str("\"Bearish Incline\"").unwrap();
        assert_eq!(back, Phase::BearishIncline);
    }

    #[test]
    fn asset_builds_trading_pair() {
        let a = Asset::new("sol", "USDT", 150.0);
        assert_eq!(a.symbol, "SOL");
        assert_eq!(a.trading_pair, "SOLUSDT");
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to(1.23456789, PRICE_DECIMALS), 1.234568);
        assert_eq!(round_to(6.499, SCORE_DECIMALS), 6.5);
    }

    #[test]
    fn timeframe_strings() {
        assert_eq!(Timeframe::M15.as_str(), "15m");
        let tf: Timeframe = serde_json::from_str("\"4m\"").unwrap();
        assert_eq!(tf, Timeframe::M4);
    }
}
