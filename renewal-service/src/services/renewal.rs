//! Renewal state machine.
//!
//! Every active subscription is reconciled against "now" once per evaluation
//! pass:
//!
//! - not yet expired: reminder check only
//! - expired without auto-renew (or without a period): reminder check only,
//!   which reports it as overdue
//! - expired with auto-renew: periods are added until the expiry is today or
//!   later, one `auto` payment is recorded, then the reminder check runs
//!   against the new expiry
//!
//! Faults stay with the subscription that raised them; the caller keeps
//! evaluating the rest of the batch.

use super::reminder::{evaluate_reminder, should_trigger_reminder, ReminderKind};
use crate::calendar::{
    lunar_to_solar, solar_to_lunar, CalendarError, CatchUp, CycleAdvancer, TimezoneClock,
};
use crate::models::{
    ManualRenewal, PaymentPatch, PaymentRecord, PaymentType, Subscription, SubscriptionMode,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    #[error("Subscription {0} has no renewal period")]
    MalformedSubscription(String),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Payment record {0} not found")]
    PaymentNotFound(String),
}

impl RenewalError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RenewalError::MalformedSubscription(_) => "malformed_subscription",
            RenewalError::Calendar(CalendarError::RoundTripFailure(_)) => "round_trip_failure",
            RenewalError::Calendar(CalendarError::OutOfRange(_)) => "out_of_range",
            RenewalError::Calendar(_) => "calendar",
            RenewalError::PaymentNotFound(_) => "payment_not_found",
        }
    }
}

/// Where a subscription ended up after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Excluded from processing.
    Inactive,
    /// Not expired yet.
    Current,
    /// Expired and left as is.
    Expired,
    Renewed(Renewal),
}

/// Bookkeeping of an automatic renewal.
#[derive(Debug, Clone, PartialEq)]
pub struct Renewal {
    pub previous_expiry: NaiveDate,
    pub periods_added: u32,
    pub payment: PaymentRecord,
    /// Lunar counting was abandoned mid-loop because of the table range.
    pub fell_back_to_solar: bool,
}

/// A reminder that is due, with the time left at evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueReminder {
    pub kind: ReminderKind,
    pub days_remaining: i64,
    pub hours_remaining: f64,
}

/// Outcome of evaluating one subscription.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub subscription: Subscription,
    pub transition: Transition,
    pub reminder: Option<DueReminder>,
    pub fault: Option<RenewalError>,
}

impl Evaluation {
    fn unchanged(subscription: &Subscription, transition: Transition) -> Self {
        Self {
            subscription: subscription.clone(),
            transition,
            reminder: None,
            fault: None,
        }
    }
}

/// Expiry as seen through the subscription's own calendar.
///
/// Lunar subscriptions pass their stored solar expiry through the lunisolar
/// table and back, which surfaces table inconsistencies before any date is
/// mutated. Dates outside the table fall back to the stored solar date.
pub fn logical_expiry(subscription: &Subscription) -> Result<NaiveDate, CalendarError> {
    if !subscription.use_lunar_cycle {
        return Ok(subscription.expiry_date);
    }
    match solar_to_lunar(subscription.expiry_date) {
        Ok(lunar) => lunar_to_solar(&lunar)
            .ok_or_else(|| CalendarError::RoundTripFailure(lunar.to_string())),
        Err(CalendarError::OutOfRange(_)) => Ok(subscription.expiry_date),
        Err(e) => Err(e),
    }
}

fn due_reminder(
    subscription: &Subscription,
    expiry: NaiveDate,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> Option<DueReminder> {
    let days_remaining = clock.days_until(expiry, now);
    let hours_remaining = clock.hours_until(expiry, now);
    evaluate_reminder(subscription.reminder_setting(), days_remaining, hours_remaining).map(
        |kind| DueReminder {
            kind,
            days_remaining,
            hours_remaining,
        },
    )
}

/// Reconcile one subscription against `now`.
pub fn evaluate_subscription(
    subscription: &Subscription,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> Evaluation {
    if !subscription.is_active {
        return Evaluation::unchanged(subscription, Transition::Inactive);
    }

    let (expiry, fault) = match logical_expiry(subscription) {
        Ok(expiry) => (expiry, None),
        Err(e) => {
            tracing::error!(
                subscription_id = %subscription.id,
                error = %e,
                "Lunar expiry lookup failed, using stored solar expiry"
            );
            (subscription.expiry_date, Some(RenewalError::from(e)))
        }
    };

    let days_diff = clock.days_until(expiry, now);
    if days_diff >= 0 {
        let mut evaluation = Evaluation::unchanged(subscription, Transition::Current);
        evaluation.reminder = due_reminder(subscription, expiry, now, clock);
        evaluation.fault = fault;
        return evaluation;
    }

    let mut evaluation = Evaluation::unchanged(subscription, Transition::Expired);
    evaluation.reminder = due_reminder(subscription, expiry, now, clock);
    evaluation.fault = fault;

    if !subscription.auto_renew || evaluation.fault.is_some() {
        return evaluation;
    }

    let Some((value, unit)) = subscription.period() else {
        tracing::warn!(
            subscription_id = %subscription.id,
            "Expired subscription has auto-renew but no period, skipping renewal"
        );
        evaluation.fault = Some(RenewalError::MalformedSubscription(
            subscription.id.clone(),
        ));
        return evaluation;
    };

    let today = clock.local_date(now);
    let base = renewal_base(subscription, today);
    let mut advancer = CycleAdvancer::new(subscription.calendar_kind());
    let catch_up = match advancer.advance_until(base, value, unit, |date| {
        clock.days_until(date, now) >= 0
    }) {
        Ok(catch_up) => catch_up,
        Err(e) => {
            tracing::error!(
                subscription_id = %subscription.id,
                error = %e,
                "Renewal arithmetic failed, leaving dates untouched"
            );
            evaluation.fault = Some(e.into());
            return evaluation;
        }
    };

    let note = if catch_up.periods > 1 {
        format!("Auto renewal, {} periods", catch_up.periods)
    } else {
        "Auto renewal".to_string()
    };
    let payment = PaymentRecord::new(
        PaymentType::Auto,
        now,
        subscription.amount,
        note,
        catch_up.start,
        catch_up.end,
    );

    let mut renewed = subscription.clone();
    renewed.start_date = Some(catch_up.start);
    renewed.expiry_date = catch_up.end;
    renewed.last_payment_date = Some(now);
    renewed.payment_history.push(payment.clone());
    renewed.updated_at = now;

    tracing::info!(
        subscription_id = %subscription.id,
        mode = subscription.subscription_mode.as_str(),
        previous_expiry = %subscription.expiry_date,
        new_expiry = %catch_up.end,
        periods = catch_up.periods,
        "Subscription auto-renewed"
    );

    // A renewal can land on an expiry that is already close; that still
    // deserves a reminder.
    let days_remaining = clock.days_until(catch_up.end, now);
    let hours_remaining = clock.hours_until(catch_up.end, now);
    let reminder =
        should_trigger_reminder(renewed.reminder_setting(), days_remaining, hours_remaining)
            .then_some(DueReminder {
                kind: ReminderKind::Upcoming,
                days_remaining,
                hours_remaining,
            });

    Evaluation {
        transition: Transition::Renewed(Renewal {
            previous_expiry: subscription.expiry_date,
            periods_added: catch_up.periods,
            payment,
            fell_back_to_solar: advancer.fell_back_to_solar(),
        }),
        subscription: renewed,
        reminder,
        fault: None,
    }
}

/// Date renewals count from: today in reset mode, the stored expiry in cycle
/// mode.
pub fn renewal_base(subscription: &Subscription, today: NaiveDate) -> NaiveDate {
    match subscription.subscription_mode {
        SubscriptionMode::Reset => today,
        SubscriptionMode::Cycle => subscription.expiry_date,
    }
}

/// Move a freshly created, already expired subscription past today.
///
/// Returns `None` when nothing had to move.
pub fn fast_forward(
    subscription: &Subscription,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> Result<Option<CatchUp>, RenewalError> {
    if clock.days_until(subscription.expiry_date, now) >= 0 {
        return Ok(None);
    }
    let (value, unit) = subscription
        .period()
        .ok_or_else(|| RenewalError::MalformedSubscription(subscription.id.clone()))?;

    let base = renewal_base(subscription, clock.local_date(now));
    let mut advancer = CycleAdvancer::new(subscription.calendar_kind());
    let catch_up =
        advancer.advance_until(base, value, unit, |date| clock.days_until(date, now) >= 0)?;
    Ok(Some(catch_up))
}

/// User-triggered renewal: the period is applied exactly
/// `period_multiplier` times, whether or not the subscription has expired.
pub fn manual_renew(
    subscription: &Subscription,
    options: &ManualRenewal,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> Result<(Subscription, PaymentRecord), RenewalError> {
    let (value, unit) = subscription
        .period()
        .ok_or_else(|| RenewalError::MalformedSubscription(subscription.id.clone()))?;

    let multiplier = options.period_multiplier.unwrap_or(1).max(1);
    let payment_date = options.payment_date.unwrap_or(now);
    let base = renewal_base(subscription, clock.local_date(now));

    let mut advancer = CycleAdvancer::new(subscription.calendar_kind());
    let catch_up = advancer.advance_times(base, value, unit, multiplier)?;

    let note = options
        .note
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Manual renewal".to_string());
    let payment = PaymentRecord::new(
        PaymentType::Manual,
        payment_date,
        options.amount.unwrap_or(subscription.amount),
        note,
        catch_up.start,
        catch_up.end,
    );

    let mut renewed = subscription.clone();
    renewed.start_date = Some(catch_up.start);
    renewed.expiry_date = catch_up.end;
    renewed.last_payment_date = Some(payment_date);
    renewed.payment_history.push(payment.clone());
    renewed.updated_at = now;

    Ok((renewed, payment))
}

fn latest_payment_date(subscription: &Subscription) -> Option<DateTime<Utc>> {
    subscription.payment_history.iter().map(|p| p.date).max()
}

fn origin_instant(subscription: &Subscription) -> DateTime<Utc> {
    subscription.origin_date().and_time(NaiveTime::MIN).and_utc()
}

/// Remove a payment and rebuild the dates derived from history.
///
/// The expiry becomes the latest `period_end` left (or the removed record's
/// `period_start` when the history is now empty). The last payment date
/// becomes the latest remaining payment, or the subscription's origin.
pub fn delete_payment(
    subscription: &Subscription,
    payment_id: &str,
    now: DateTime<Utc>,
) -> Result<Subscription, RenewalError> {
    let position = subscription
        .payment_history
        .iter()
        .position(|p| p.id == payment_id)
        .ok_or_else(|| RenewalError::PaymentNotFound(payment_id.to_string()))?;

    let mut updated = subscription.clone();
    let removed = updated.payment_history.remove(position);

    updated.expiry_date = updated
        .payment_history
        .iter()
        .map(|p| p.period_end)
        .max()
        .unwrap_or(removed.period_start);
    updated.last_payment_date =
        Some(latest_payment_date(&updated).unwrap_or_else(|| origin_instant(subscription)));
    updated.updated_at = now;

    Ok(updated)
}

/// Apply an operator's edit to a payment record.
pub fn edit_payment(
    subscription: &Subscription,
    payment_id: &str,
    patch: &PaymentPatch,
    now: DateTime<Utc>,
) -> Result<Subscription, RenewalError> {
    let mut updated = subscription.clone();
    let record = updated
        .payment_history
        .iter_mut()
        .find(|p| p.id == payment_id)
        .ok_or_else(|| RenewalError::PaymentNotFound(payment_id.to_string()))?;

    if let Some(date) = patch.date {
        record.date = date;
    }
    if let Some(amount) = patch.amount {
        record.amount = amount;
    }
    if let Some(note) = &patch.note {
        record.note = note.clone();
    }

    updated.last_payment_date = latest_payment_date(&updated).or(updated.last_payment_date);
    updated.updated_at = now;
    Ok(updated)
}
