//! Lunisolar calendar backed by a fixed year table.
//!
//! Each table entry describes one lunar year:
//!
//! - bits 0-3: number of the leap month (0 when the year has none)
//! - bits 4-15: month lengths, month 1 in bit 15 down to month 12 in bit 4
//!   (set = 30 days, clear = 29 days)
//! - bit 16: the leap month has 30 days
//!
//! Lunar 1900-01-01 falls on solar 1900-01-31, which anchors every offset
//! computed here.

use super::CalendarError;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

#[rustfmt::skip]
static LUNAR_INFO: [u32; 201] = [
    0x04bd8, 0x04ae0, 0x0a570, 0x054d5, 0x0d260, 0x0d950, 0x16554, 0x056a0, 0x09ad0, 0x055d2, // 1900-1909
    0x04ae0, 0x0a5b6, 0x0a4d0, 0x0d250, 0x1d255, 0x0b540, 0x0d6a0, 0x0ada2, 0x095b0, 0x14977, // 1910-1919
    0x04970, 0x0a4b0, 0x0b4b5, 0x06a50, 0x06d40, 0x1ab54, 0x02b60, 0x09570, 0x052f2, 0x04970, // 1920-1929
    0x06566, 0x0d4a0, 0x0ea50, 0x16a95, 0x05ad0, 0x02b60, 0x186e3, 0x092e0, 0x1c8d7, 0x0c950, // 1930-1939
    0x0d4a0, 0x1d8a6, 0x0b550, 0x056a0, 0x1a5b4, 0x025d0, 0x092d0, 0x0d2b2, 0x0a950, 0x0b557, // 1940-1949
    0x06ca0, 0x0b550, 0x15355, 0x04da0, 0x0a5b0, 0x14573, 0x052b0, 0x0a9a8, 0x0e950, 0x06aa0, // 1950-1959
    0x0aea6, 0x0ab50, 0x04b60, 0x0aae4, 0x0a570, 0x05260, 0x0f263, 0x0d950, 0x05b57, 0x056a0, // 1960-1969
    0x096d0, 0x04dd5, 0x04ad0, 0x0a4d0, 0x0d4d4, 0x0d250, 0x0d558, 0x0b540, 0x0b6a0, 0x195a6, // 1970-1979
    0x095b0, 0x049b0, 0x0a974, 0x0a4b0, 0x0b27a, 0x06a50, 0x06d40, 0x0af46, 0x0ab60, 0x09570, // 1980-1989
    0x04af5, 0x04970, 0x064b0, 0x074a3, 0x0ea50, 0x06b58, 0x05ac0, 0x0ab60, 0x096d5, 0x092e0, // 1990-1999
    0x0c960, 0x0d954, 0x0d4a0, 0x0da50, 0x07552, 0x056a0, 0x0abb7, 0x025d0, 0x092d0, 0x0cab5, // 2000-2009
    0x0a950, 0x0b4a0, 0x0baa4, 0x0ad50, 0x055d9, 0x04ba0, 0x0a5b0, 0x15176, 0x052b0, 0x0a930, // 2010-2019
    0x07954, 0x06aa0, 0x0ad50, 0x05b52, 0x04b60, 0x0a6e6, 0x0a4e0, 0x0d260, 0x0ea65, 0x0d530, // 2020-2029
    0x05aa0, 0x076a3, 0x096d0, 0x04afb, 0x04ad0, 0x0a4d0, 0x1d0b6, 0x0d250, 0x0d520, 0x0dd45, // 2030-2039
    0x0b5a0, 0x056d0, 0x055b2, 0x049b0, 0x0a577, 0x0a4b0, 0x0aa50, 0x1b255, 0x06d20, 0x0ada0, // 2040-2049
    0x14b63, 0x09370, 0x049f8, 0x04970, 0x064b0, 0x168a6, 0x0ea50, 0x06b20, 0x1a6c4, 0x0aae0, // 2050-2059
    0x092e0, 0x0d2e3, 0x0c960, 0x0d557, 0x0d4a0, 0x0da50, 0x05d55, 0x056a0, 0x0a6d0, 0x055d4, // 2060-2069
    0x052d0, 0x0a9b8, 0x0a950, 0x0b4a0, 0x0b6a6, 0x0ad50, 0x055a0, 0x0aba4, 0x0a5b0, 0x052b0, // 2070-2079
    0x0b273, 0x06930, 0x07337, 0x06aa0, 0x0ad50, 0x14b55, 0x04b60, 0x0a570, 0x054e4, 0x0d160, // 2080-2089
    0x0e968, 0x0d520, 0x0daa0, 0x16aa6, 0x056d0, 0x04ae0, 0x0a9d4, 0x0a2d0, 0x0d150, 0x0f252, // 2090-2099
    0x0d520,                                                                                   // 2100
];

const HEAVENLY_STEMS: [&str; 10] = ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];

const EARTHLY_BRANCHES: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];

const MONTH_NAMES: [&str; 12] = [
    "正", "二", "三", "四", "五", "六", "七", "八", "九", "十", "冬", "腊",
];

const DAY_NAMES: [&str; 30] = [
    "初一", "初二", "初三", "初四", "初五", "初六", "初七", "初八", "初九", "初十",
    "十一", "十二", "十三", "十四", "十五", "十六", "十七", "十八", "十九", "二十",
    "廿一", "廿二", "廿三", "廿四", "廿五", "廿六", "廿七", "廿八", "廿九", "三十",
];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 31).expect("lunar epoch is a valid date")
}

fn is_supported_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

/// Table entry for `year`; years outside the table read as an all-zero entry.
fn year_info(year: i32) -> u32 {
    if is_supported_year(year) {
        LUNAR_INFO[(year - MIN_YEAR) as usize]
    } else {
        0
    }
}

/// Month number (1-12) of the leap month in `year`, or 0 when there is none.
pub fn leap_month_index(year: i32) -> u32 {
    year_info(year) & 0xf
}

/// Length of the leap month in `year`: 0 when the year has no leap month.
pub fn leap_month_length(year: i32) -> u32 {
    if leap_month_index(year) == 0 {
        0
    } else if year_info(year) & 0x10000 != 0 {
        30
    } else {
        29
    }
}

/// Length (29 or 30) of the regular month `month` in `year`.
pub fn month_length(year: i32, month: u32) -> u32 {
    if !(1..=12).contains(&month) {
        return 29;
    }
    if year_info(year) & (0x10000 >> month) != 0 {
        30
    } else {
        29
    }
}

/// Number of days in lunar `year`, leap month included.
pub fn year_length(year: i32) -> u32 {
    let long_months = (year_info(year) & 0xfff0).count_ones();
    348 + long_months + leap_month_length(year)
}

/// A date in the lunisolar calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap_month: bool,
}

impl LunarDate {
    /// Build a lunar date, checking it against the year table.
    pub fn new(
        year: i32,
        month: u32,
        day: u32,
        is_leap_month: bool,
    ) -> Result<Self, CalendarError> {
        if !is_supported_year(year) {
            return Err(CalendarError::OutOfRange(year));
        }
        let date = Self {
            year,
            month,
            day,
            is_leap_month,
        };
        if !(1..=12).contains(&month) || day == 0 {
            return Err(CalendarError::InvalidLunarDate(date.to_string()));
        }
        if is_leap_month && leap_month_index(year) != month {
            return Err(CalendarError::InvalidLunarDate(date.to_string()));
        }
        if day > date.days_in_month() {
            return Err(CalendarError::InvalidLunarDate(date.to_string()));
        }
        Ok(date)
    }

    /// Length of the month this date sits in, honouring the leap flag.
    pub fn days_in_month(&self) -> u32 {
        if self.is_leap_month {
            leap_month_length(self.year)
        } else {
            month_length(self.year, self.month)
        }
    }

    /// Sexagenary year name, e.g. `甲辰` for 2024.
    pub fn year_name(&self) -> String {
        let stem = (self.year - 4).rem_euclid(10) as usize;
        let branch = (self.year - 4).rem_euclid(12) as usize;
        format!("{}{}", HEAVENLY_STEMS[stem], EARTHLY_BRANCHES[branch])
    }

    /// Month name with the leap prefix, e.g. `正月` or `闰四月`.
    pub fn month_name(&self) -> String {
        let name = MONTH_NAMES[(self.month.clamp(1, 12) - 1) as usize];
        if self.is_leap_month {
            format!("闰{}月", name)
        } else {
            format!("{}月", name)
        }
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES[(self.day.clamp(1, 30) - 1) as usize]
    }

    /// Full display label, e.g. `甲辰年正月初一`.
    pub fn full_label(&self) -> String {
        format!("{}年{}{}", self.year_name(), self.month_name(), self.day_name())
    }

    pub fn to_solar(&self) -> Option<NaiveDate> {
        lunar_to_solar(self)
    }
}

impl fmt::Display for LunarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{}{:02}-{:02}",
            self.year,
            if self.is_leap_month { "L" } else { "" },
            self.month,
            self.day
        )
    }
}

/// Convert a solar date to its lunisolar equivalent.
///
/// Only solar dates from 1900-01-31 through 2100-12-31 have a representation;
/// anything else fails with [`CalendarError::OutOfRange`] and callers are
/// expected to fall back to solar-only logic.
pub fn solar_to_lunar(date: NaiveDate) -> Result<LunarDate, CalendarError> {
    if !is_supported_year(date.year()) || date < epoch() {
        return Err(CalendarError::OutOfRange(date.year()));
    }

    let mut offset = (date - epoch()).num_days();
    let mut year = MIN_YEAR;
    loop {
        let length = i64::from(year_length(year));
        if offset < length {
            break;
        }
        offset -= length;
        year += 1;
        if year > MAX_YEAR {
            return Err(CalendarError::OutOfRange(date.year()));
        }
    }

    // The leap month follows the regular month sharing its number: the first
    // pass through that number is non-leap, the repeat is leap.
    let leap = leap_month_index(year);
    for month in 1..=12u32 {
        let length = i64::from(month_length(year, month));
        if offset < length {
            return Ok(LunarDate {
                year,
                month,
                day: offset as u32 + 1,
                is_leap_month: false,
            });
        }
        offset -= length;

        if month == leap {
            let length = i64::from(leap_month_length(year));
            if offset < length {
                return Ok(LunarDate {
                    year,
                    month,
                    day: offset as u32 + 1,
                    is_leap_month: true,
                });
            }
            offset -= length;
        }
    }

    Err(CalendarError::RoundTripFailure(date.to_string()))
}

/// Convert a lunar date back to the solar calendar.
///
/// Returns `None` when the lunar date is not valid for its year (wrong leap
/// flag, day past the month end) or when its solar equivalent falls outside
/// the range [`solar_to_lunar`] accepts, so that
/// `solar_to_lunar(lunar_to_solar(l)?) == Ok(l)` holds whenever it is `Some`.
pub fn lunar_to_solar(lunar: &LunarDate) -> Option<NaiveDate> {
    LunarDate::new(lunar.year, lunar.month, lunar.day, lunar.is_leap_month).ok()?;

    let mut offset: i64 = (MIN_YEAR..lunar.year)
        .map(|year| i64::from(year_length(year)))
        .sum();

    let leap = leap_month_index(lunar.year);
    for month in 1..lunar.month {
        offset += i64::from(month_length(lunar.year, month));
        if month == leap {
            offset += i64::from(leap_month_length(lunar.year));
        }
    }
    if lunar.is_leap_month {
        offset += i64::from(month_length(lunar.year, lunar.month));
    }
    offset += i64::from(lunar.day) - 1;

    let solar = epoch().checked_add_signed(Duration::days(offset))?;
    if solar.year() > MAX_YEAR {
        return None;
    }
    Some(solar)
}
