//! Notice text for reminders and renewals.

use super::Notification;
use crate::models::Subscription;
use crate::services::display::lunar_label;
use crate::services::reminder::ReminderKind;
use crate::services::renewal::{DueReminder, Renewal};

fn expiry_line(subscription: &Subscription) -> String {
    match lunar_label(subscription) {
        Some(label) => format!("Expiry: {} ({})", subscription.expiry_date, label),
        None => format!("Expiry: {}", subscription.expiry_date),
    }
}

fn amount_line(subscription: &Subscription) -> String {
    format!("Amount: {} {}", subscription.amount, subscription.currency)
}

fn time_left(reminder: &DueReminder) -> String {
    match reminder.days_remaining {
        0 => {
            let hours = reminder.hours_remaining.max(0.0).floor() as i64;
            if hours == 0 {
                "Expires within the hour".to_string()
            } else {
                format!("Expires today, {} hours left", hours)
            }
        }
        1 => "Expires tomorrow".to_string(),
        days => format!("Expires in {} days", days),
    }
}

fn tags(kind: &str) -> Vec<String> {
    vec!["subscription".to_string(), kind.to_string()]
}

/// Notice for a subscription that is about to expire or already has.
pub fn compose_reminder(subscription: &Subscription, reminder: &DueReminder) -> Notification {
    let (title, status) = match reminder.kind {
        ReminderKind::Upcoming => (
            format!("Subscription reminder: {}", subscription.name),
            time_left(reminder),
        ),
        ReminderKind::Overdue => (
            format!("Subscription expired: {}", subscription.name),
            format!("Expired {} days ago", -reminder.days_remaining),
        ),
    };

    let mut lines = vec![status, expiry_line(subscription), amount_line(subscription)];
    lines.push(format!(
        "Auto-renew: {}",
        if subscription.auto_renew { "on" } else { "off" }
    ));
    if let Some(notes) = subscription.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Notes: {}", notes));
    }

    Notification {
        title,
        body: lines.join("\n"),
        tags: tags(reminder.kind.as_str()),
        subscription_id: Some(subscription.id.clone()),
    }
}

/// Notice for an automatic renewal. `subscription` is the renewed state.
pub fn compose_renewal(subscription: &Subscription, renewal: &Renewal) -> Notification {
    let mut lines = vec![
        format!("Previous expiry: {}", renewal.previous_expiry),
        expiry_line(subscription),
        amount_line(subscription),
    ];
    if renewal.periods_added > 1 {
        lines.push(format!("Periods added: {}", renewal.periods_added));
    }
    if renewal.fell_back_to_solar {
        lines.push("Lunar dates unavailable past 2100, solar dates used".to_string());
    }

    Notification {
        title: format!("Subscription renewed: {}", subscription.name),
        body: lines.join("\n"),
        tags: tags("renewal"),
        subscription_id: Some(subscription.id.clone()),
    }
}
