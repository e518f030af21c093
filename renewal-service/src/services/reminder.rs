//! Reminder threshold evaluation.

use crate::models::{ReminderSetting, ReminderUnit};

/// Decide whether a reminder fires now.
///
/// `days_diff` is the difference between the local midnights of the expiry
/// day and today; `hours_diff` is the continuous time left until expiry. A
/// subscription expiring today has `days_diff == 0` while `hours_diff` can be
/// anywhere in `(0, 24]`, so the two are not interchangeable.
///
/// A zero hour threshold only fires inside the coming hour, while a zero day
/// threshold fires for the whole expiry day. The asymmetry is kept as is.
pub fn should_trigger_reminder(setting: ReminderSetting, days_diff: i64, hours_diff: f64) -> bool {
    match setting.unit {
        ReminderUnit::Hour if setting.value == 0 => (0.0..1.0).contains(&hours_diff),
        ReminderUnit::Hour => hours_diff >= 0.0 && hours_diff <= f64::from(setting.value),
        ReminderUnit::Day if setting.value == 0 => days_diff == 0,
        ReminderUnit::Day => days_diff >= 0 && days_diff <= i64::from(setting.value),
    }
}

/// Kind of notice a subscription is due for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Expiry is within the reminder threshold.
    Upcoming,
    /// Already expired and not going to renew by itself.
    Overdue,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Upcoming => "reminder",
            ReminderKind::Overdue => "expired",
        }
    }
}

/// Classify a subscription that is not being renewed in this pass.
///
/// Anything past expiry gets an overdue notice; otherwise the threshold in
/// `setting` decides.
pub fn evaluate_reminder(
    setting: ReminderSetting,
    days_diff: i64,
    hours_diff: f64,
) -> Option<ReminderKind> {
    if days_diff < 0 {
        Some(ReminderKind::Overdue)
    } else if should_trigger_reminder(setting, days_diff, hours_diff) {
        Some(ReminderKind::Upcoming)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_threshold_boundaries() {
        let setting = ReminderSetting::days(7);
        assert!(should_trigger_reminder(setting, 7, 168.0));
        assert!(!should_trigger_reminder(setting, 8, 192.0));
        assert!(!should_trigger_reminder(setting, -1, -24.0));
    }

    #[test]
    fn test_zero_day_threshold_fires_only_on_expiry_day() {
        let setting = ReminderSetting::days(0);
        assert!(should_trigger_reminder(setting, 0, 0.0));
        assert!(!should_trigger_reminder(setting, 1, 20.0));
    }

    #[test]
    fn test_zero_hour_threshold_is_narrower_than_zero_day() {
        // Expires at the end of today, 5 hours from now.
        assert!(should_trigger_reminder(ReminderSetting::days(0), 0, 5.0));
        assert!(!should_trigger_reminder(ReminderSetting::hours(0), 0, 5.0));
        assert!(should_trigger_reminder(ReminderSetting::hours(0), 0, 0.5));
    }

    #[test]
    fn test_hour_threshold_boundaries() {
        let setting = ReminderSetting::hours(24);
        assert!(should_trigger_reminder(setting, 1, 24.0));
        assert!(!should_trigger_reminder(setting, 1, 24.01));
        assert!(!should_trigger_reminder(setting, -1, -0.5));
    }

    #[test]
    fn test_overdue_classification() {
        assert_eq!(
            evaluate_reminder(ReminderSetting::days(3), -2, -40.0),
            Some(ReminderKind::Overdue)
        );
        assert_eq!(
            evaluate_reminder(ReminderSetting::days(3), 2, 40.0),
            Some(ReminderKind::Upcoming)
        );
        assert_eq!(evaluate_reminder(ReminderSetting::days(3), 4, 90.0), None);
    }
}
