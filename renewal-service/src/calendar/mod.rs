//! Date arithmetic for renewal cycles.
//!
//! Solar dates are plain `chrono::NaiveDate` values. Lunisolar dates come from
//! a fixed year table covering 1900-2100; everything outside that window
//! degrades to solar-only arithmetic at the call sites.

pub mod clock;
pub mod cycle;
pub mod lunar;
pub mod lunar_period;

use thiserror::Error;

pub use clock::{Clock, DateParts, FixedClock, SystemClock, TimezoneClock};
pub use cycle::{add_solar_period, CalendarKind, CatchUp, CycleAdvancer, PeriodUnit};
pub use lunar::{lunar_to_solar, solar_to_lunar, LunarDate};
pub use lunar_period::add_lunar_period;

/// Errors raised by the calendar engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    /// Date has no lunisolar representation in the 1900-2100 table.
    #[error("Year {0} is outside the supported lunar range")]
    OutOfRange(i32),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    /// A lunar date produced by the engine has no solar equivalent.
    #[error("Lunar date {0} has no solar equivalent")]
    RoundTripFailure(String),

    #[error("Invalid lunar date: {0}")]
    InvalidLunarDate(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
}
