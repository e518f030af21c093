//! Reminder thresholds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Days notice given when a subscription carries no reminder fields at all.
pub const DEFAULT_REMINDER_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderUnit {
    Day,
    Hour,
}

/// Normalised reminder threshold of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSetting {
    pub unit: ReminderUnit,
    pub value: u32,
}

impl ReminderSetting {
    pub fn days(value: u32) -> Self {
        Self {
            unit: ReminderUnit::Day,
            value,
        }
    }

    pub fn hours(value: u32) -> Self {
        Self {
            unit: ReminderUnit::Hour,
            value,
        }
    }

    /// Resolve the stored reminder fields, which may come from older records
    /// that only carry `reminderDays` or `reminderHours`.
    ///
    /// The unit is hours only when explicitly set to `hour`. An explicit
    /// non-negative `reminderValue` wins; otherwise the legacy field for the
    /// unit is used (7 days or 0 hours when absent). Anything negative or
    /// non-numeric resolves to 0.
    pub fn resolve(
        reminder_unit: Option<&str>,
        reminder_value: Option<&Value>,
        reminder_days: Option<&Value>,
        reminder_hours: Option<&Value>,
    ) -> Self {
        let unit = match reminder_unit.map(str::trim) {
            Some("hour") => ReminderUnit::Hour,
            _ => ReminderUnit::Day,
        };

        let explicit = reminder_value
            .and_then(numeric)
            .filter(|v| *v >= 0);

        let value = match explicit {
            Some(v) => v,
            None => {
                let (legacy, default) = match unit {
                    ReminderUnit::Hour => (reminder_hours, 0),
                    ReminderUnit::Day => (reminder_days, i64::from(DEFAULT_REMINDER_DAYS)),
                };
                match legacy.filter(|v| !v.is_null()) {
                    Some(v) => numeric(v).unwrap_or(0),
                    None => default,
                }
            }
        };

        Self {
            unit,
            value: value.clamp(0, i64::from(u32::MAX)) as u32,
        }
    }
}

/// Read a JSON number or numeric string, truncating fractions.
fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64),
        _ => None,
    }
}
