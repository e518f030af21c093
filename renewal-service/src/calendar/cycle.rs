//! Cycle advancement across solar and lunar calendars.

use super::lunar::{lunar_to_solar, solar_to_lunar};
use super::lunar_period::add_lunar_period;
use super::CalendarError;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Upper bound on catch-up iterations in a single pass. A one-day period
/// renewing a subscription idle for a century stays well below this.
const MAX_CATCH_UP_PERIODS: u32 = 100_000;

/// Unit of a renewal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Day,
    Month,
    Year,
}

impl PeriodUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "day" => Some(PeriodUnit::Day),
            "month" => Some(PeriodUnit::Month),
            "year" => Some(PeriodUnit::Year),
            _ => None,
        }
    }
}

/// Which calendar a period is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    Solar,
    Lunar,
}

impl CalendarKind {
    pub fn from_lunar_flag(use_lunar_cycle: bool) -> Self {
        if use_lunar_cycle {
            CalendarKind::Lunar
        } else {
            CalendarKind::Solar
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::Solar => "solar",
            CalendarKind::Lunar => "lunar",
        }
    }
}

/// Add a solar period. Month and year steps clamp to the last day of the
/// target month (Jan 31 + 1 month = Feb 28/29).
pub fn add_solar_period(date: NaiveDate, value: u32, unit: PeriodUnit) -> Option<NaiveDate> {
    match unit {
        PeriodUnit::Day => date.checked_add_days(Days::new(u64::from(value))),
        PeriodUnit::Month => date.checked_add_months(Months::new(value)),
        PeriodUnit::Year => date.checked_add_months(Months::new(value.checked_mul(12)?)),
    }
}

/// Result of advancing a date until it reaches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUp {
    /// Date the advancement started from.
    pub start: NaiveDate,
    /// Date the last period was added to.
    pub last_base: NaiveDate,
    pub end: NaiveDate,
    pub periods: u32,
}

/// Adds renewal periods to solar dates, counting in either calendar.
///
/// Lunar counting needs the lunisolar table. Once a date falls outside it the
/// advancer switches to solar counting for the rest of its lifetime, so a
/// catch-up crossing 2100 keeps a consistent calendar from that point on.
#[derive(Debug, Clone)]
pub struct CycleAdvancer {
    kind: CalendarKind,
    fell_back: bool,
}

impl CycleAdvancer {
    pub fn new(kind: CalendarKind) -> Self {
        Self {
            kind,
            fell_back: false,
        }
    }

    pub fn kind(&self) -> CalendarKind {
        self.kind
    }

    /// Whether lunar counting was abandoned because of the table range.
    pub fn fell_back_to_solar(&self) -> bool {
        self.fell_back
    }

    /// Produce the next occurrence of `date` one period later.
    pub fn add_period(
        &mut self,
        date: NaiveDate,
        value: u32,
        unit: PeriodUnit,
    ) -> Result<NaiveDate, CalendarError> {
        if value == 0 {
            return Err(CalendarError::InvalidPeriod(
                "period value must be positive".to_string(),
            ));
        }

        if self.kind == CalendarKind::Lunar {
            match self.add_lunar(date, value, unit) {
                Ok(next) => return Ok(next),
                Err(CalendarError::OutOfRange(year)) => {
                    tracing::warn!(
                        date = %date,
                        year = year,
                        "Lunar table range exceeded, continuing with solar arithmetic"
                    );
                    self.kind = CalendarKind::Solar;
                    self.fell_back = true;
                }
                Err(e) => return Err(e),
            }
        }

        add_solar_period(date, value, unit).ok_or(CalendarError::OutOfRange(date.year()))
    }

    fn add_lunar(
        &self,
        date: NaiveDate,
        value: u32,
        unit: PeriodUnit,
    ) -> Result<NaiveDate, CalendarError> {
        let lunar = solar_to_lunar(date)?;
        let next = add_lunar_period(lunar, i64::from(value), unit)?;
        lunar_to_solar(&next).ok_or_else(|| CalendarError::RoundTripFailure(next.to_string()))
    }

    /// Add periods to `start` until `reached` accepts the result.
    ///
    /// At least one period is always added. Each result becomes the base of
    /// the next addition. Gives up with `InvalidPeriod` once
    /// `MAX_CATCH_UP_PERIODS` periods have been added without `reached`
    /// accepting the result.
    pub fn advance_until<F>(
        &mut self,
        start: NaiveDate,
        value: u32,
        unit: PeriodUnit,
        mut reached: F,
    ) -> Result<CatchUp, CalendarError>
    where
        F: FnMut(NaiveDate) -> bool,
    {
        let mut base = start;
        let mut periods = 0;
        loop {
            let next = self.add_period(base, value, unit)?;
            if next <= base {
                return Err(CalendarError::RoundTripFailure(format!(
                    "period addition did not advance {}",
                    base
                )));
            }
            periods += 1;
            if reached(next) {
                return Ok(CatchUp {
                    start,
                    last_base: base,
                    end: next,
                    periods,
                });
            }
            if periods >= MAX_CATCH_UP_PERIODS {
                return Err(CalendarError::InvalidPeriod(format!(
                    "catch-up limit of {} periods reached at {}",
                    MAX_CATCH_UP_PERIODS, next
                )));
            }
            base = next;
        }
    }

    /// Apply exactly `times` periods to `start`.
    pub fn advance_times(
        &mut self,
        start: NaiveDate,
        value: u32,
        unit: PeriodUnit,
        times: u32,
    ) -> Result<CatchUp, CalendarError> {
        let mut remaining = times.max(1);
        self.advance_until(start, value, unit, |_| {
            remaining -= 1;
            remaining == 0
        })
    }
}
