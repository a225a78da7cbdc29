//! Lookup helpers for loosely-shaped ticket JSON.
//!
//! Ticket payloads spell the same attribute several ways (`created_at`,
//! `createdAt`, `date_created`, ...). Every attribute is resolved through
//! an ordered key list: the first key holding usable content wins. Values
//! that are `null`, blank strings or empty arrays count as absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

pub fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        _ => true,
    }
}

/// First value under `keys` that carries content.
pub fn first_present<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = record.as_object()?;
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| has_content(value))
}

/// Scalar coerced to trimmed text. Numbers keep their JSON spelling.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    let obj = record.as_object()?;
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(as_text)
}

pub fn first_timestamp(record: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    let obj = record.as_object()?;
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(parse_timestamp)
}

pub fn first_count(record: &Value, keys: &[&str]) -> Option<u64> {
    let obj = record.as_object()?;
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(as_count)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(arr) => Some(arr.len() as u64),
        _ => None,
    }
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_present_skips_blank_values() {
        let record = json!({"subject": "  ", "title": "Router down"});
        let found = first_present(&record, &["subject", "title"]).unwrap();
        assert_eq!(found, &json!("Router down"));
    }

    #[test]
    fn first_present_respects_key_order() {
        let record = json!({"title": "second", "subject": "first"});
        assert_eq!(
            first_text(&record, &["subject", "title"]).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn first_present_on_non_object_is_none() {
        assert!(first_present(&json!([1, 2]), &["id"]).is_none());
        assert!(first_text(&json!("id"), &["id"]).is_none());
    }

    #[test]
    fn numbers_coerce_to_text() {
        let record = json!({"id": 42});
        assert_eq!(first_text(&record, &["id"]).as_deref(), Some("42"));
    }

    #[test]
    fn empty_arrays_are_absent() {
        let record = json!({"attachments": [], "images": [{"uri": "a.png"}]});
        let found = first_present(&record, &["attachments", "images"]).unwrap();
        assert_eq!(found.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_timestamp(&json!("2024-03-05T10:20:30+02:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-05T08:20:30+00:00");
    }

    #[test]
    fn parses_sql_style_datetime_as_utc() {
        let ts = parse_timestamp(&json!("2024-03-05 10:20:30")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap());

        let ts = parse_timestamp(&json!("2024-03-05T10:20:30.250")).unwrap();
        assert_eq!(ts.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn parses_bare_date_at_midnight() {
        let ts = parse_timestamp(&json!("2024-01-01")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_epoch_seconds_and_millis() {
        let secs = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(secs, millis);
        let from_str = parse_timestamp(&json!("1700000000")).unwrap();
        assert_eq!(secs, from_str);
    }

    #[test]
    fn unparseable_timestamp_falls_through_to_next_key() {
        let record = json!({"created_at": "yesterday-ish", "createdAt": "2024-02-02"});
        let ts = first_timestamp(&record, &["created_at", "createdAt"]).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn counts_accept_numbers_strings_and_arrays() {
        assert_eq!(first_count(&json!({"n": 3}), &["n"]), Some(3));
        assert_eq!(first_count(&json!({"n": "4"}), &["n"]), Some(4));
        assert_eq!(first_count(&json!({"n": [1, 2]}), &["n"]), Some(2));
        assert_eq!(first_count(&json!({"n": "many"}), &["n"]), None);
    }

    #[test]
    fn out_of_range_epochs_are_unparseable() {
        assert_eq!(parse_timestamp(&json!(i64::MIN)), None);
        assert_eq!(parse_timestamp(&json!(i64::MAX)), None);
        assert_eq!(parse_timestamp(&json!(i64::MIN.to_string())), None);

        let record = json!({"created_at": i64::MIN, "createdAt": "2024-02-02"});
        let ts = first_timestamp(&record, &["created_at", "createdAt"]).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn negative_epochs_use_the_same_threshold() {
        let secs = parse_timestamp(&json!(-86_400)).unwrap();
        assert_eq!(secs, Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap());
        let millis = parse_timestamp(&json!(-100_000_000_000i64)).unwrap();
        assert_eq!(millis.timestamp(), -100_000_000);
    }
}
