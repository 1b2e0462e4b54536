//! Parsing of engine-side log timestamps
//!
//! The engine stamps every log line with an extended ISO 8601 timestamp
//! carrying nanosecond precision, e.g. `2014-11-24T22:34:00.761764812Z`.

use chrono::{DateTime, FixedOffset, Utc};

/// Parse a timestamp token taken from the front of a log line.
///
/// Accepts the engine's RFC 3339 format with or without a fractional part.
/// Returns `None` when the token is not a valid timestamp.
pub fn parse_timestamp(token: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(token).ok()
}

/// The moment of receipt, used when a log line carries no timestamp of its
/// own (e.g. when timestamps were not requested from the engine).
pub fn receipt_time() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}
