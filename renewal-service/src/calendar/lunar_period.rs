//! Period addition on lunisolar dates.

use super::cycle::PeriodUnit;
use super::lunar::{
    leap_month_index, lunar_to_solar, solar_to_lunar, LunarDate, MAX_YEAR, MIN_YEAR,
};
use super::CalendarError;
use chrono::Duration;

/// Add `value` days, months or years to a lunar date.
///
/// Month and year steps move along regular month numbers; the leap flag only
/// survives when the target year has a leap month with the same number. Day
/// steps are solar days: lunar months have no fixed length, so "N lunar days"
/// means N calendar days on the solar equivalent.
pub fn add_lunar_period(
    lunar: LunarDate,
    value: i64,
    unit: PeriodUnit,
) -> Result<LunarDate, CalendarError> {
    let (year, month) = match unit {
        PeriodUnit::Day => {
            let solar = lunar_to_solar(&lunar)
                .ok_or_else(|| CalendarError::RoundTripFailure(lunar.to_string()))?;
            let shifted = solar
                .checked_add_signed(Duration::days(value))
                .ok_or(CalendarError::OutOfRange(lunar.year))?;
            return solar_to_lunar(shifted);
        }
        PeriodUnit::Year => (i64::from(lunar.year) + value, lunar.month),
        PeriodUnit::Month => {
            let index = (i64::from(lunar.year) - i64::from(MIN_YEAR)) * 12
                + i64::from(lunar.month)
                - 1
                + value;
            (
                i64::from(MIN_YEAR) + index.div_euclid(12),
                index.rem_euclid(12) as u32 + 1,
            )
        }
    };

    if year < i64::from(MIN_YEAR) || year > i64::from(MAX_YEAR) {
        return Err(CalendarError::OutOfRange(
            i32::try_from(year).unwrap_or(i32::MAX),
        ));
    }
    let year = year as i32;

    let is_leap_month = lunar.is_leap_month && leap_month_index(year) == month;
    let mut candidate = LunarDate {
        year,
        month,
        day: lunar.day,
        is_leap_month,
    };
    candidate.day = candidate.day.min(candidate.days_in_month());

    // Near the end of the table a valid lunar day can map past the last
    // supported solar date; walk back until it resolves.
    while lunar_to_solar(&candidate).is_none() {
        if candidate.day <= 1 {
            return Err(CalendarError::OutOfRange(year));
        }
        candidate.day -= 1;
    }

    Ok(candidate)
}
