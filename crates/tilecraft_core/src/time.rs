//! Timestamps and duration parsing
//!
//! All time in tilecraft is explicit: the host passes the current time into
//! every operation as epoch milliseconds, so timers and live values are
//! deterministic under test.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Failure to parse a backend duration or timestamp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("malformed duration `{0}`")]
    Duration(String),
    #[error("malformed timestamp `{0}`")]
    Timestamp(String),
}

/// Parse an `HH:MM:SS` (or `H:MM:SS.fff`, `MM:SS`) duration into seconds
pub fn parse_duration_secs(text: &str) -> Result<f64, TimeParseError> {
    let err = || TimeParseError::Duration(text.to_string());
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(err());
    }

    let mut total = 0.0;
    for part in &parts {
        let n: f64 = part.trim().parse().map_err(|_| err())?;
        if !n.is_finite() || n < 0.0 {
            return Err(err());
        }
        total = total * 60.0 + n;
    }
    Ok(total)
}

/// Parse an RFC 3339 / ISO-8601 timestamp into epoch milliseconds
pub fn parse_timestamp(text: &str) -> Result<Timestamp, TimeParseError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|_| TimeParseError::Timestamp(text.to_string()))
}

/// Current wall-clock time, for hosts that do not run on a virtual clock
pub fn now() -> Timestamp {
    Utc::now().timestamp_millis()
}
