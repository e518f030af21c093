//! Domain models for renewal-service.

mod payment;
mod reminder;
mod settings;
mod subscription;

pub use payment::{PaymentPatch, PaymentRecord, PaymentType};
pub use reminder::{ReminderSetting, ReminderUnit, DEFAULT_REMINDER_DAYS};
pub use settings::AppSettings;
pub use subscription::{
    CreateSubscription, ManualRenewal, Subscription, SubscriptionMode, UpdateSubscription,
};
