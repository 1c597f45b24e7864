use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use hourglass_rs::SafeTimeProvider;
use serde_json::Value;

/// timezone the school operates in
pub const SCHOOL_TZ: Tz = chrono_tz::Asia::Kolkata;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// resolve a date-like value to the calendar day it falls on in `tz`
///
/// Instants (RFC 3339 strings, epoch milliseconds) are converted into `tz`
/// first, so a timestamp stored as `2024-01-09T18:30:00Z` lands on
/// 2024-01-10 in IST. Naive dates and datetimes are taken as local wall time.
pub fn parse_local_date(value: &Value, tz: Tz) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_text(s, tz),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&tz).date_naive()),
        _ => None,
    }
}

/// text form of [`parse_local_date`]
pub fn parse_date_text(raw: &str, tz: Tz) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(instant.with_timezone(&tz).date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// canonical `YYYY-MM-DD` key, empty when the value is absent or unparsable
pub fn to_date_key(value: &Value, tz: Tz) -> String {
    parse_local_date(value, tz)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// today's calendar date in `tz` according to the time provider
pub fn today_in(tz: Tz, time_provider: &SafeTimeProvider) -> NaiveDate {
    time_provider.now().with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;
    use rstest::rstest;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(json!("2024-01-10"), "2024-01-10")]
    #[case(json!("2024-01-10 09:15:00"), "2024-01-10")]
    #[case(json!("2024-01-10T23:59"), "2024-01-10")]
    #[case(json!("10-01-2024"), "2024-01-10")]
    #[case(json!("10/01/2024"), "2024-01-10")]
    #[case(json!("2024-01-09T18:30:00.000Z"), "2024-01-10")]
    #[case(json!("2024-01-10T05:00:00+05:30"), "2024-01-10")]
    #[case(json!(""), "")]
    #[case(json!("not a date"), "")]
    #[case(json!(null), "")]
    #[case(json!(true), "")]
    fn test_date_keys(#[case] input: Value, #[case] expected: &str) {
        assert_eq!(to_date_key(&input, SCHOOL_TZ), expected);
    }

    #[test]
    fn test_same_local_day_same_key() {
        // 18:31 UTC on the 9th and 18:29 UTC on the 10th are both the 10th in IST
        let late = json!("2024-01-09T18:31:00Z");
        let early = json!("2024-01-10T18:29:00Z");
        assert_eq!(to_date_key(&late, SCHOOL_TZ), to_date_key(&early, SCHOOL_TZ));

        // two minutes past local midnight is the next day
        let utc_next = json!("2024-01-10T18:31:00Z");
        assert_ne!(to_date_key(&late, SCHOOL_TZ), to_date_key(&utc_next, SCHOOL_TZ));
    }

    #[test]
    fn test_epoch_millis() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 9, 19, 0, 0).unwrap();
        let value = json!(instant.timestamp_millis());
        assert_eq!(parse_local_date(&value, SCHOOL_TZ), Some(ymd(2024, 1, 10)));
        assert_eq!(parse_local_date(&value, chrono_tz::UTC), Some(ymd(2024, 1, 9)));
    }

    #[test]
    fn test_today_in_timezone() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 2, 19, 20, 0, 0).unwrap()
        ));
        assert_eq!(today_in(SCHOOL_TZ, &time), ymd(2024, 2, 20));
        assert_eq!(today_in(chrono_tz::UTC, &time), ymd(2024, 2, 19));
    }
}
