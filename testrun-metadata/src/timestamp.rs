// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient ISO-8601 timestamp handling.
//!
//! Emitters don't agree on a single timestamp format. RFC 3339 timestamps (with
//! an offset) are preferred, but naive timestamps such as
//! `2024-04-27T10:00:00.123456` or `2024-04-27 10:00:00` are common too. Naive
//! timestamps are interpreted as UTC.
//!
//! The [`serialize`] and [`deserialize`] functions make this module usable with
//! `#[serde(with = "testrun_metadata::timestamp")]`.

use crate::errors::TimestampParseError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serializer};

static NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a timestamp, accepting RFC 3339 and naive ISO-8601 forms.
pub fn parse(input: &str) -> Result<DateTime<FixedOffset>, TimestampParseError> {
    let trimmed = input.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| TimestampParseError::new(input))
}

/// Formats a timestamp as RFC 3339 with the precision it carries.
pub fn format(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Serializes a timestamp as an RFC 3339 string.
pub fn serialize<S: Serializer>(
    timestamp: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(timestamp))
}

/// Deserializes a timestamp with [`parse`].
pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<FixedOffset>, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use test_case::test_case;

    #[test_case("2024-04-27T10:15:30+02:00", 8, 0 ; "rfc3339 with offset")]
    #[test_case("2024-04-27T10:15:30Z", 10, 0 ; "rfc3339 utc")]
    #[test_case("2024-04-27T10:15:30.250000", 10, 250_000_000 ; "naive isoformat")]
    #[test_case("2024-04-27 10:15:30.5", 10, 500_000_000 ; "naive with space")]
    #[test_case("2024-04-27T10:15:30", 10, 0 ; "naive without fraction")]
    fn parse_accepts(input: &str, utc_hour: u32, nanos: u32) {
        let timestamp = parse(input).expect("timestamp parses");
        let utc = timestamp.to_utc();
        assert_eq!(utc.hour(), utc_hour);
        assert_eq!(utc.minute(), 15);
        assert_eq!(utc.nanosecond(), nanos);
    }

    #[test_case("" ; "empty")]
    #[test_case("yesterday" ; "words")]
    #[test_case("2024-13-01T00:00:00" ; "bad month")]
    fn parse_rejects(input: &str) {
        let error = parse(input).expect_err("not a timestamp");
        assert_eq!(error.input(), input);
    }

    #[test]
    fn format_round_trips() {
        let timestamp = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 27, 10, 0, 0)
            .unwrap();
        let formatted = format(&timestamp);
        assert_eq!(formatted, "2024-04-27T10:00:00+01:00");
        assert_eq!(parse(&formatted), Ok(timestamp));
    }
}
