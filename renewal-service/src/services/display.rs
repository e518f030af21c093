//! Read-only views of a subscription's timing.

use crate::calendar::{solar_to_lunar, TimezoneClock};
use crate::models::Subscription;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Time left until a subscription runs out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remaining {
    /// Local calendar days; negative once expired.
    pub days: i64,
    /// Continuous hours until the end of the expiry day.
    pub hours: f64,
    pub expired: bool,
    /// Lunar label of the expiry, for lunar subscriptions inside the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunar_label: Option<String>,
}

pub fn remaining(
    subscription: &Subscription,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> Remaining {
    let days = clock.days_until(subscription.expiry_date, now);
    let hours = clock.hours_until(subscription.expiry_date, now);
    Remaining {
        days,
        hours,
        expired: days < 0,
        lunar_label: lunar_label(subscription),
    }
}

/// Lunar label of the expiry date ("甲辰年正月初一"), when the subscription
/// counts in the lunar calendar.
pub fn lunar_label(subscription: &Subscription) -> Option<String> {
    if !subscription.use_lunar_cycle {
        return None;
    }
    solar_to_lunar(subscription.expiry_date)
        .ok()
        .map(|lunar| lunar.full_label())
}
