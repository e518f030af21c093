//! Lunisolar calendar integration tests for renewal-service.

mod common;

use common::ymd;
use renewal_service::calendar::{
    add_lunar_period, lunar_to_solar, solar_to_lunar, CalendarError, CalendarKind, CycleAdvancer,
    LunarDate, PeriodUnit,
};

#[test]
fn round_trip_holds_for_every_supported_day() {
    let mut date = ymd(1900, 1, 31);
    let last = ymd(2100, 12, 31);
    let mut checked = 0;
    while date <= last {
        let lunar = solar_to_lunar(date).expect("date inside the table");
        assert_eq!(lunar_to_solar(&lunar), Some(date), "round trip of {}", date);
        checked += 1;
        date = date.succ_opt().unwrap();
    }
    assert_eq!(checked, 73_384);
}

#[test]
fn lunar_new_year_2024_labels() {
    let lunar = solar_to_lunar(ymd(2024, 2, 10)).unwrap();
    assert_eq!(lunar, LunarDate::new(2024, 1, 1, false).unwrap());
    assert_eq!(lunar.year_name(), "甲辰");
    assert_eq!(lunar.month_name(), "正月");
    assert_eq!(lunar.day_name(), "初一");
    assert_eq!(lunar.full_label(), "甲辰年正月初一");
}

#[test]
fn leap_month_dates_resolve() {
    // 2023 repeats the second month; its leap month starts on Mar 22.
    let lunar = solar_to_lunar(ymd(2023, 3, 22)).unwrap();
    assert!(lunar.is_leap_month);
    assert_eq!((lunar.year, lunar.month, lunar.day), (2023, 2, 1));
    assert_eq!(lunar.month_name(), "闰二月");
    assert_eq!(lunar_to_solar(&lunar), Some(ymd(2023, 3, 22)));

    let regular = LunarDate::new(2023, 3, 1, false).unwrap();
    assert_eq!(lunar_to_solar(&regular), Some(ymd(2023, 4, 20)));
}

#[test]
fn years_outside_table_are_out_of_range() {
    assert_eq!(
        solar_to_lunar(ymd(2101, 2, 1)),
        Err(CalendarError::OutOfRange(2101))
    );
    assert!(matches!(
        solar_to_lunar(ymd(1899, 12, 31)),
        Err(CalendarError::OutOfRange(_))
    ));
}

#[test]
fn twelve_month_step_matches_twelve_single_steps() {
    for (year, month, day) in [(2023, 1, 15), (2024, 5, 29), (2025, 6, 1), (2033, 11, 20)] {
        let start = LunarDate::new(year, month, day, false).unwrap();

        let jumped = add_lunar_period(start, 12, PeriodUnit::Month).unwrap();
        let mut stepped = start;
        for _ in 0..12 {
            stepped = add_lunar_period(stepped, 1, PeriodUnit::Month).unwrap();
        }

        assert_eq!(jumped, stepped, "from {}", start);
        assert_eq!(lunar_to_solar(&jumped), lunar_to_solar(&stepped));
        assert_eq!((jumped.year, jumped.month, jumped.day), (year + 1, month, day));
    }
}

#[test]
fn lunar_monthly_cycle_tracks_new_moons() {
    let mut advancer = CycleAdvancer::new(CalendarKind::Lunar);
    let catch_up = advancer
        .advance_until(ymd(2024, 2, 10), 1, PeriodUnit::Month, |d| d >= ymd(2024, 4, 1))
        .unwrap();
    assert_eq!(catch_up.end, ymd(2024, 4, 9));
    assert_eq!(catch_up.last_base, ymd(2024, 3, 10));
    assert_eq!(catch_up.periods, 2);
    assert!(!advancer.fell_back_to_solar());
}

#[test]
fn catch_up_across_table_end_continues_in_solar() {
    // Lunar 2100-11-01 is solar 2100-12-01; a lunar year later is past the table.
    let mut advancer = CycleAdvancer::new(CalendarKind::Lunar);
    let catch_up = advancer
        .advance_until(ymd(2100, 12, 1), 1, PeriodUnit::Year, |d| d >= ymd(2102, 6, 1))
        .unwrap();

    assert!(advancer.fell_back_to_solar());
    assert_eq!(advancer.kind(), CalendarKind::Solar);
    assert_eq!(catch_up.end, ymd(2102, 12, 1));
    assert_eq!(catch_up.periods, 2);
}
