//! Live tick payload decoding

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::types::{FeedError, Symbol, Tick};

/// Decoded push message
#[derive(Debug, Clone, PartialEq)]
pub enum TickMessage {
    /// Well-formed price observation
    Tick(Tick),
    /// Server-reported error string
    Upstream(String),
}

/// Decode one push payload of shape `{time, <CURRENCY>, error?, prediction?}`.
///
/// A non-null `error` field takes precedence over missing `time` or price.
pub fn parse_tick_message(
    symbol: Symbol,
    currency: &str,
    raw: &[u8],
) -> Result<TickMessage, FeedError> {
    // simd-json parses in place
    let mut buf = raw.to_vec();
    let value: Value = simd_json::from_slice(&mut buf).map_err(|_| FeedError::Parse)?;

    let Value::Object(map) = value else {
        return Err(FeedError::Validation);
    };

    if let Some(err) = map.get("error").filter(|v| !v.is_null()) {
        let message = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(TickMessage::Upstream(message));
    }

    let time = match map.get("time") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(FeedError::Validation),
    };

    let price = map
        .get(currency)
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or(FeedError::Validation)?;

    let predicted_price = map
        .get("predictedPrice")
        .or_else(|| map.get("prediction"))
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite());

    Ok(TickMessage::Tick(Tick {
        symbol,
        time,
        price,
        predicted_price,
    }))
}

/// Interpret a server time label as a date value.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// bare `YYYY-MM-DD`, and integer epoch seconds.
pub fn parse_time(label: &str) -> Option<NaiveDateTime> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
        return Some(dt.naive_utc());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(label, fmt) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(label, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    if label.chars().all(|c| c.is_ascii_digit()) {
        let secs: i64 = label.parse().ok()?;
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }

    None
}
