//! Recovering absolute instants from crawl timestamps and relative-age fields.
//!
//! The feed never states when a report was made. Each crawl re-reports the report's
//! age ("hours and minutes ago"), so the absolute time is the crawl time minus that age.

use crate::error::ParseError;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// Crawl timestamps look like `Mon Jan 25 08:01:03 UTC 2016`.
pub const CRAWL_TIME_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

/// Decodes a crawl timestamp into a UTC instant.
pub fn parse_crawl_time(value: &str) -> Result<DateTime<Utc>, ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), CRAWL_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| ParseError::CrawlTime {
            value: value.to_string(),
            source,
        })
}

/// Parses a whole-number count, accepting float renderings such as `"3.0"` that
/// appear when the exporter widened an integer column.
pub fn parse_count(field: &'static str, value: &str) -> Result<i64, ParseError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

/// Rounds to the nearest whole minute, half-up.
pub fn round_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp().rem_euclid(60);
    let nanos = i64::from(t.timestamp_subsec_nanos());
    let floor = t - TimeDelta::seconds(secs) - TimeDelta::nanoseconds(nanos);
    if secs >= 30 {
        floor + TimeDelta::minutes(1)
    } else {
        floor
    }
}

/// `crawl_time − (hours·3600 + minutes·60)`, rounded to the minute.
///
/// An age that does not fit chrono's representable range is a decode failure for
/// `field`, not a panic.
pub fn subtract_age(
    field: &'static str,
    crawl_time: DateTime<Utc>,
    hours: i64,
    minutes: i64,
) -> Result<DateTime<Utc>, ParseError> {
    let out_of_range = || ParseError::AgeOutOfRange {
        field,
        value: format!("{hours}h {minutes}m"),
    };
    let age = TimeDelta::try_hours(hours)
        .zip(TimeDelta::try_minutes(minutes))
        .and_then(|(h, m)| h.checked_add(&m))
        .ok_or_else(out_of_range)?;
    let shifted = crawl_time.checked_sub_signed(age).ok_or_else(out_of_range)?;
    // Rounding moves the instant by less than a minute either way.
    let margin = TimeDelta::minutes(1);
    if shifted.checked_add_signed(margin).is_none()
        || shifted.checked_sub_signed(margin).is_none()
    {
        return Err(out_of_range());
    }
    Ok(round_to_minute(shifted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_crawl_time() {
        let t = parse_crawl_time("Mon Jan 25 08:01:03 UTC 2016").unwrap();
        assert_eq!(t, utc(2016, 1, 25, 8, 1, 3));
    }

    #[test]
    fn test_parse_crawl_time_trims_whitespace() {
        let t = parse_crawl_time("  Fri Feb 05 23:59:59 UTC 2016 ").unwrap();
        assert_eq!(t, utc(2016, 2, 5, 23, 59, 59));
    }

    #[test]
    fn test_parse_crawl_time_rejects_other_formats() {
        assert!(parse_crawl_time("2016-01-25 08:01:03").is_err());
        assert!(parse_crawl_time("Mon Jan 25 08:01:03 EET 2016").is_err());
        assert!(parse_crawl_time("").is_err());
    }

    #[test]
    fn test_parse_count_accepts_float_rendering() {
        assert_eq!(parse_count("rd.rp.hr", "3").unwrap(), 3);
        assert_eq!(parse_count("rd.rp.hr", " 3.0 ").unwrap(), 3);
        assert!(parse_count("rd.rp.hr", "3.5").is_err());
        assert!(parse_count("rd.rp.hr", "abc").is_err());
    }

    #[test]
    fn test_round_to_minute_half_up() {
        assert_eq!(round_to_minute(utc(2016, 1, 25, 8, 1, 29)), utc(2016, 1, 25, 8, 1, 0));
        assert_eq!(round_to_minute(utc(2016, 1, 25, 8, 1, 30)), utc(2016, 1, 25, 8, 2, 0));
        assert_eq!(round_to_minute(utc(2016, 1, 25, 23, 59, 45)), utc(2016, 1, 26, 0, 0, 0));
        assert_eq!(round_to_minute(utc(2016, 1, 25, 8, 1, 0)), utc(2016, 1, 25, 8, 1, 0));
    }

    #[test]
    fn test_subtract_age_is_deterministic() {
        let crawl = utc(2016, 1, 25, 8, 1, 40);
        let first = subtract_age("rd.rp.hr", crawl, 1, 15).unwrap();
        assert_eq!(first, utc(2016, 1, 25, 6, 47, 0));
        for _ in 0..5 {
            assert_eq!(subtract_age("rd.rp.hr", crawl, 1, 15).unwrap(), first);
        }
    }

    #[test]
    fn test_repeated_crawls_land_within_a_minute() {
        // A report made at 07:00:20 seen by two crawls a few minutes apart.
        let a = subtract_age("rd.rp.hr", utc(2016, 1, 25, 7, 10, 5), 0, 9).unwrap();
        let b = subtract_age("rd.rp.hr", utc(2016, 1, 25, 7, 15, 50), 0, 15).unwrap();
        assert!((a - b).num_minutes().abs() <= 1);
    }

    #[test]
    fn test_subtract_age_rejects_unrepresentable_age() {
        let crawl = utc(2016, 1, 25, 8, 0, 0);
        let ages = [
            (10_000_000_000, 0),
            (3_000_000_000_000, 0),
            (0, i64::MAX),
            (i64::MIN, 0),
        ];
        for (hours, minutes) in ages {
            assert!(matches!(
                subtract_age("rd.rp.hr", crawl, hours, minutes),
                Err(ParseError::AgeOutOfRange { field: "rd.rp.hr", .. })
            ));
        }
    }
}
