//! CME futures session calendar.
//!
//! Sessions open at 18:00 New York time. There is no Saturday session; the
//! Friday session runs until the Sunday open.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;

fn session_open_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// First session open strictly after `now`.
pub fn next_session_open(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&New_York);
    let mut date = local.date_naive();
    if local.time() >= session_open_time() {
        date += Duration::days(1);
    }
    if date.weekday() == Weekday::Sat {
        date += Duration::days(1);
    }

    New_York
        .from_local_datetime(&date.and_time(session_open_time()))
        .earliest()
        .map(|open| open.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_same_day_before_open() {
        // Tue 2026-01-13 10:00 EST
        assert_eq!(next_session_open(utc(2026, 1, 13, 15, 0)), utc(2026, 1, 13, 23, 0));
    }

    #[test]
    fn test_after_open_rolls_to_next_day() {
        // Tue 2026-01-13 18:00 EST exactly
        assert_eq!(next_session_open(utc(2026, 1, 13, 23, 0)), utc(2026, 1, 14, 23, 0));
    }

    #[test]
    fn test_friday_evening_skips_saturday() {
        // Fri 2026-01-16 19:00 EST
        assert_eq!(next_session_open(utc(2026, 1, 17, 0, 0)), utc(2026, 1, 18, 23, 0));
    }

    #[test]
    fn test_saturday_goes_to_sunday() {
        assert_eq!(next_session_open(utc(2026, 1, 17, 15, 0)), utc(2026, 1, 18, 23, 0));
    }

    #[test]
    fn test_daylight_saving_offset() {
        // Wed 2026-07-15 09:00 EDT, open is 22:00 UTC
        assert_eq!(next_session_open(utc(2026, 7, 15, 13, 0)), utc(2026, 7, 15, 22, 0));
    }
}
