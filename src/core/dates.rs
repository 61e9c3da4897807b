//! Lenient date parsing shared by attribute preparation and date rules.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Storage format for date attributes.
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an instant. Values without an offset are taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(relative) = parse_relative(raw) {
        return Some(relative);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Re-render `raw` in UTC storage form.
pub fn to_storage_format(raw: &str) -> Option<String> {
    parse_datetime(raw).map(|instant| instant.format(STORAGE_DATE_FORMAT).to_string())
}

fn parse_relative(raw: &str) -> Option<DateTime<Utc>> {
    let now = Utc::now();
    let midnight = |instant: DateTime<Utc>| {
        instant
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
    };

    match raw.to_ascii_lowercase().as_str() {
        "now" => Some(now),
        "today" => midnight(now),
        "tomorrow" => midnight(now + Duration::days(1)),
        "yesterday" => midnight(now - Duration::days(1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_normalized_to_utc() {
        assert_eq!(
            to_storage_format("2024-03-01T12:30:00+02:00").as_deref(),
            Some("2024-03-01 10:30:00")
        );
        assert_eq!(
            to_storage_format("2024-03-01 12:30:00").as_deref(),
            Some("2024-03-01 12:30:00")
        );
        assert_eq!(to_storage_format("2024-03-01").as_deref(), Some("2024-03-01 00:00:00"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("2024-13-40").is_none());
    }

    #[test]
    fn test_relative_words() {
        let today = parse_datetime("today").unwrap();
        let tomorrow = parse_datetime("tomorrow").unwrap();
        assert_eq!(tomorrow - today, Duration::days(1));
    }
}
