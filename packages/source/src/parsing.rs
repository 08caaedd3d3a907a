//! Shared parsing utilities for collision event rows.
//!
//! Date, coordinate and count parsing used by the CSV loader.

use chrono::{NaiveDate, NaiveDateTime};

/// Parses a collision date.
///
/// Accepts plain dates (`2021-04-22`, `04/22/2021`) and ISO 8601
/// timestamps with optional fractional seconds, keeping only the day.
#[must_use]
pub fn parse_event_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.date());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.date());
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
}

/// Parses lng/lat from optional f64 fields. Returns `None` if missing,
/// non-finite, or zero.
#[must_use]
pub fn parse_lng_lat(lng: Option<f64>, lat: Option<f64>) -> Option<(f64, f64)> {
    let longitude = lng?;
    let latitude = lat?;
    if !longitude.is_finite() || !latitude.is_finite() {
        return None;
    }
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((longitude, latitude))
}

/// Parses a person count. Missing counts are zero; negative or
/// non-finite counts are rejected.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_count(value: Option<f64>) -> Option<u32> {
    match value {
        None => Some(0),
        Some(v) if v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX) => Some(v.round() as u32),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_date() {
        let date = parse_event_date("2021-04-22").unwrap();
        assert_eq!(date.to_string(), "2021-04-22");
    }

    #[test]
    fn parses_timestamp_with_fractional() {
        let date = parse_event_date("2021-09-11T00:00:00.000").unwrap();
        assert_eq!(date.to_string(), "2021-09-11");
    }

    #[test]
    fn parses_timestamp_without_fractional() {
        let date = parse_event_date("2021-09-11T14:30:00").unwrap();
        assert_eq!(date.to_string(), "2021-09-11");
    }

    #[test]
    fn parses_us_date() {
        let date = parse_event_date("09/11/2021").unwrap();
        assert_eq!(date.to_string(), "2021-09-11");
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_event_date("not-a-date").is_none());
        assert!(parse_event_date("").is_none());
    }

    #[test]
    fn rejects_zero_or_missing_coordinates() {
        assert!(parse_lng_lat(Some(0.0), Some(40.7)).is_none());
        assert!(parse_lng_lat(Some(-73.9), None).is_none());
        assert!(parse_lng_lat(Some(f64::NAN), Some(40.7)).is_none());
        let (lng, lat) = parse_lng_lat(Some(-73.9), Some(40.7)).unwrap();
        assert!((lng - -73.9).abs() < f64::EPSILON);
        assert!((lat - 40.7).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_default_to_zero() {
        assert_eq!(parse_count(None), Some(0));
        assert_eq!(parse_count(Some(3.0)), Some(3));
        assert_eq!(parse_count(Some(-1.0)), None);
        assert_eq!(parse_count(Some(f64::INFINITY)), None);
    }
}
