//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp, truncated to the stored (microsecond) precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Format a timestamp for storage.
///
/// Always microsecond precision with a `Z` suffix, so every stored value has the
/// same width and lexical order in SQL matches chronological order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`to_db_timestamp`] (any RFC 3339 value is accepted)
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }

    #[test]
    fn test_db_timestamp_is_fixed_width() {
        let whole_second = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let formatted = to_db_timestamp(&whole_second);
        assert_eq!(formatted, "2025-01-02T03:04:05.000000Z");

        let later = whole_second + chrono::Duration::microseconds(7);
        assert_eq!(to_db_timestamp(&later).len(), formatted.len());
        assert!(to_db_timestamp(&later) > formatted);
    }

    #[test]
    fn test_db_timestamp_parses_back() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::microseconds(123_456);
        let parsed = parse_db_timestamp(&to_db_timestamp(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_db_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, Error::Timestamp { .. }));
    }
}
