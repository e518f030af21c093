//! Subscription model.

use super::payment::PaymentRecord;
use super::reminder::{ReminderSetting, ReminderUnit};
use crate::calendar::{CalendarKind, PeriodUnit};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a renewal starts counting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Renew from the previous expiry; no time is lost or gained.
    #[default]
    Cycle,
    /// Renew from the moment of renewal; unpaid idle time is skipped.
    Reset,
}

impl SubscriptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionMode::Cycle => "cycle",
            SubscriptionMode::Reset => "reset",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "CNY".to_string()
}

/// A recurring subscription.
///
/// `expiry_date` is always a solar date. Lunar subscriptions count their
/// periods in the lunisolar calendar and store the solar equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub period_value: Option<u32>,
    #[serde(default)]
    pub period_unit: Option<PeriodUnit>,
    #[serde(default)]
    pub use_lunar_cycle: bool,
    #[serde(default)]
    pub subscription_mode: SubscriptionMode,
    #[serde(default = "default_true")]
    pub auto_renew: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_days: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_hours: Option<Value>,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub last_payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_history: Vec<PaymentRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Renewal period, when both parts are set and the value is positive.
    pub fn period(&self) -> Option<(u32, PeriodUnit)> {
        match (self.period_value, self.period_unit) {
            (Some(value), Some(unit)) if value > 0 => Some((value, unit)),
            _ => None,
        }
    }

    pub fn calendar_kind(&self) -> CalendarKind {
        CalendarKind::from_lunar_flag(self.use_lunar_cycle)
    }

    pub fn reminder_setting(&self) -> ReminderSetting {
        ReminderSetting::resolve(
            self.reminder_unit.as_deref(),
            self.reminder_value.as_ref(),
            self.reminder_days.as_ref(),
            self.reminder_hours.as_ref(),
        )
    }

    /// Replace the reminder fields with a single normalised setting.
    pub fn set_reminder(&mut self, setting: ReminderSetting) {
        self.reminder_unit = Some(
            match setting.unit {
                ReminderUnit::Day => "day",
                ReminderUnit::Hour => "hour",
            }
            .to_string(),
        );
        self.reminder_value = Some(Value::from(setting.value));
        self.reminder_days = None;
        self.reminder_hours = None;
    }

    /// Date used when history runs out: the start date, or creation day.
    pub fn origin_date(&self) -> NaiveDate {
        self.start_date
            .unwrap_or_else(|| self.created_at.date_naive())
    }
}

/// Input for creating a subscription.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscription {
    pub name: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub period_value: Option<u32>,
    pub period_unit: Option<PeriodUnit>,
    #[serde(default)]
    pub use_lunar_cycle: bool,
    #[serde(default)]
    pub subscription_mode: SubscriptionMode,
    pub auto_renew: Option<bool>,
    pub reminder: Option<ReminderSetting>,
    #[serde(default)]
    pub amount: Decimal,
    pub currency: Option<String>,
}

/// Partial update of a subscription. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscription {
    pub name: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub period_value: Option<u32>,
    pub period_unit: Option<PeriodUnit>,
    pub use_lunar_cycle: Option<bool>,
    pub subscription_mode: Option<SubscriptionMode>,
    pub auto_renew: Option<bool>,
    pub reminder: Option<ReminderSetting>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

/// Options for a user-triggered renewal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualRenewal {
    pub payment_date: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub period_multiplier: Option<u32>,
    pub note: Option<String>,
}
