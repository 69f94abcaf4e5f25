use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single kline reduced to the fields the indicators consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the UNIX epoch (UTC).
    pub open_time: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open_time: i64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open_time,
            high,
            low,
            close,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a Binance klines payload into candles (oldest-first).
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume, ...
///
/// A payload that is not an array (error objects, empty 451 results) decodes
/// to an empty series.  Individual malformed entries are skipped.
pub fn parse_klines(payload: &Value) -> Vec<Candle> {
    let Some(raw) = payload.as_array() else {
        warn!("klines payload is not an array — treating as empty series");
        return Vec::new();
    };

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        match parse_entry(entry) {
            Some(candle) => candles.push(candle),
            None => warn!(entry = %entry, "skipping malformed kline entry"),
        }
    }
    candles
}

fn parse_entry(entry: &Value) -> Option<Candle> {
    let arr = entry.as_array()?;
    if arr.len() < 5 {
        return None;
    }

    let open_time = arr[0].as_i64()?;
    let high = parse_str_f64(&arr[2])?;
    let low = parse_str_f64(&arr[3])?;
    let close = parse_str_f64(&arr[4])?;

    Some(Candle::new(open_time, high, low, close))
}

/// Parse a JSON value that may be either a numeric string or a number.
pub fn parse_str_f64(val: &Value) -> Option<f64> {
    let n = match val {
        Value::String(s) => s.parse::<f64>().ok()?,
        other => other.as_f64()?,
    };
    n.is_finite().then_some(n)
}
