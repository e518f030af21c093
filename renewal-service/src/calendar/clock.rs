//! Wall clock and timezone-aware day arithmetic.
//!
//! Instants are always `DateTime<Utc>`; a timezone only decides how an instant
//! is split into local calendar fields. Host-local time is never consulted.

use super::CalendarError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Local calendar fields of an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl DateParts {
    pub fn date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))
}

/// Calendar arithmetic in one named timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneClock {
    tz: Tz,
}

impl TimezoneClock {
    /// Resolve `name`, falling back to UTC when it is not a known zone.
    pub fn new(name: &str) -> Self {
        match parse_timezone(name) {
            Ok(tz) => Self { tz },
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to UTC");
                Self { tz: Tz::UTC }
            }
        }
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn date_parts(&self, instant: DateTime<Utc>) -> DateParts {
        let local = instant.with_timezone(&self.tz);
        DateParts {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
        }
    }

    /// Local calendar date of `instant`.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Instant of local midnight on the same local day as `instant`.
    pub fn midnight_timestamp(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.midnight_of(self.local_date(instant))
    }

    /// Instant at which local `date` begins.
    ///
    /// Zones that skip midnight for daylight saving start the day at the
    /// first local time that exists.
    pub fn midnight_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let mut time = NaiveTime::MIN;
        for _ in 0..4 {
            if let Some(local) = self.tz.from_local_datetime(&date.and_time(time)).earliest() {
                return local.with_timezone(&Utc);
            }
            time += chrono::Duration::minutes(30);
        }
        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
    }

    /// Whole local calendar days from the day of `now` to `date`.
    ///
    /// Negative once `date` lies in the past. Equal to the difference between
    /// the two local midnights, counted in calendar days rather than 24 hour
    /// buckets so daylight saving shifts do not skew it.
    pub fn days_until(&self, date: NaiveDate, now: DateTime<Utc>) -> i64 {
        (date - self.local_date(now)).num_days()
    }

    /// Instant a subscription expiring on local `date` runs out: the end of
    /// that local day.
    pub fn expiry_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        match date.succ_opt() {
            Some(next) => self.midnight_of(next),
            None => self.midnight_of(date),
        }
    }

    /// Continuous hours from `now` until a subscription expiring on `date`
    /// runs out, which is the end of that local day.
    ///
    /// On the expiry day itself this lies in `(0, 24]`: exactly 24 at local
    /// midnight, never 0 while `days_until` still reports 0. Reminder
    /// thresholds in hours are compared against this value, not against the
    /// `[0, 24)` remainder of the current day.
    pub fn hours_until(&self, date: NaiveDate, now: DateTime<Utc>) -> f64 {
        (self.expiry_instant(date) - now).num_seconds() as f64 / 3600.0
    }
}

/// Current instant. The timezone has no effect on an absolute instant; it is
/// accepted for symmetry with [`date_parts`].
pub fn now(_timezone: &str) -> DateTime<Utc> {
    Utc::now()
}

/// Split `instant` into local fields of `timezone` (UTC when unknown).
pub fn date_parts(instant: DateTime<Utc>, timezone: &str) -> DateParts {
    TimezoneClock::new(timezone).date_parts(instant)
}

/// Local midnight in `timezone` of the day containing `instant`.
pub fn midnight_timestamp(instant: DateTime<Utc>, timezone: &str) -> DateTime<Utc> {
    TimezoneClock::new(timezone).midnight_timestamp(instant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_date_parts_in_shanghai() {
        let parts = date_parts(utc(2024, 3, 1, 18, 30), "Asia/Shanghai");
        assert_eq!((parts.year, parts.month, parts.day), (2024, 3, 2));
        assert_eq!((parts.hour, parts.minute), (2, 30));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let parts = date_parts(utc(2024, 3, 1, 18, 30), "Mars/Olympus");
        assert_eq!((parts.day, parts.hour), (1, 18));
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(CalendarError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_midnight_timestamp_uses_local_day() {
        // 18:30 UTC on Mar 1 is already Mar 2 in Shanghai (UTC+8).
        let midnight = midnight_timestamp(utc(2024, 3, 1, 18, 30), "Asia/Shanghai");
        assert_eq!(midnight, utc(2024, 3, 1, 16, 0));
    }

    #[test]
    fn test_days_and_hours_are_distinct() {
        let clock = TimezoneClock::new("UTC");
        let now = utc(2024, 3, 1, 23, 0);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(clock.days_until(today, now), 0);
        assert!((clock.hours_until(today, now) - 1.0).abs() < 1e-9);
        assert_eq!(clock.days_until(tomorrow, now), 1);
        assert!((clock.hours_until(tomorrow, now) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_day_starts_with_full_day_left() {
        let clock = TimezoneClock::new("UTC");
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let midnight = utc(2024, 3, 1, 0, 0);
        assert_eq!(clock.days_until(expiry, midnight), 0);
        assert_eq!(clock.hours_until(expiry, midnight), 24.0);
        assert_eq!(clock.hours_until(expiry, utc(2024, 2, 29, 23, 0)), 25.0);
    }

    #[test]
    fn test_midnight_skipped_by_dst() {
        // Santiago moves clocks from 00:00 to 01:00 on 2024-09-08.
        let clock = TimezoneClock::new("America/Santiago");
        let day = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let start = clock.midnight_of(day);
        assert_eq!(clock.local_date(start), day);
    }
}
