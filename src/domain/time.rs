//! Trade timestamp formatting and lenient parsing.
//!
//! New trades are stamped as `YYYY-MM-DD HH:MM:SS` in the configured
//! journal timezone. Stored ledgers written by older tools carry a mix
//! of formats, so parsing accepts RFC 3339 plus a handful of naive
//! layouts which are interpreted in the journal timezone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Display format used when stamping new trades.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Format a zoned instant the way trades are persisted.
pub fn format_local(at: &DateTime<Tz>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Parse a stored trade timestamp into the journal timezone.
///
/// Returns `None` when the text matches none of the known layouts or
/// names a local time that does not exist (DST gap).
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Utc};
    use chrono_tz::Europe::Berlin;

    #[test]
    fn test_format_roundtrips_through_parse() {
        let at = Berlin.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let text = format_local(&at);
        assert_eq!(text, "2024-01-01 10:00:00");
        assert_eq!(parse_timestamp(&text, Berlin), Some(at));
    }

    #[test]
    fn test_rfc3339_is_converted_to_journal_zone() {
        let parsed = parse_timestamp("2024-06-01T22:30:00Z", Berlin).unwrap();
        // CEST is UTC+2, so this lands on the next local day.
        assert_eq!(parsed.day(), 2);
        assert_eq!(parsed.hour(), 0);
        assert_eq!(parsed.with_timezone(&Utc).hour(), 22);
    }

    #[test]
    fn test_date_only_and_german_layouts() {
        let d = parse_timestamp("2024-03-05", Berlin).unwrap();
        assert_eq!((d.month(), d.day(), d.hour()), (3, 5, 0));

        let g = parse_timestamp("05.03.2024 14:15", Berlin).unwrap();
        assert_eq!((g.month(), g.day(), g.hour(), g.minute()), (3, 5, 14, 15));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_timestamp("", Berlin).is_none());
        assert!(parse_timestamp("yesterday", Berlin).is_none());
    }
}
