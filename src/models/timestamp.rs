use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format an instant the way it is persisted (RFC 3339, UTC, microseconds)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a persisted timestamp.
///
/// Accepts RFC 3339 and the naive ISO form written by older data files
/// (`2024-03-01T10:15:30.123456`), which is read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_then_parse_is_lossless() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap();
        let text = format_timestamp(at);
        assert_eq!(text, "2024-03-01T10:15:30.000000Z");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn test_parse_naive_legacy_timestamp() {
        let parsed = parse_timestamp("2024-03-01T10:15:30.123456").unwrap();
        assert_eq!(parsed.timestamp(), 1709288130);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("Unknown"), None);
    }
}
