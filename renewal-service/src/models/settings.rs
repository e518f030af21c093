//! Application settings persisted next to the subscription list.

use crate::services::notifier::ChannelType;
use serde::{Deserialize, Serialize};

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_reminder_days() -> u32 {
    super::reminder::DEFAULT_REMINDER_DAYS
}

fn default_base_currency() -> String {
    "CNY".to_string()
}

/// User-editable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// IANA timezone all day arithmetic is done in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Local hours (0-23) at which reminders may go out. Empty means any hour.
    #[serde(default)]
    pub notification_hours: Vec<u32>,
    #[serde(default)]
    pub enabled_channels: Vec<ChannelType>,
    /// Reminder days applied to new subscriptions that set none.
    #[serde(default = "default_reminder_days")]
    pub default_reminder_days: u32,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            notification_hours: Vec::new(),
            enabled_channels: Vec::new(),
            default_reminder_days: default_reminder_days(),
            base_currency: default_base_currency(),
        }
    }
}

impl AppSettings {
    /// Whether reminders may be sent at local `hour`.
    pub fn allows_hour(&self, hour: u32) -> bool {
        self.notification_hours.is_empty() || self.notification_hours.contains(&hour)
    }
}
