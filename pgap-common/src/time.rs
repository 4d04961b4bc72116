//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Low-order four digits of a timestamp's Unix milliseconds, zero-padded
///
/// Used as the uniqueness suffix of department access codes.
pub fn four_digit_suffix(timestamp: DateTime<Utc>) -> String {
    format!("{:04}", timestamp.timestamp_millis().rem_euclid(10_000))
}

/// Serialize a timestamp the way both storage tiers expect (RFC 3339)
pub fn to_wire(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

/// Parse an RFC 3339 timestamp coming off the wire
pub fn from_wire(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
