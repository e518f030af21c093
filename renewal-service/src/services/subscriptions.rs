//! Subscription management over the repository.

use super::display::{remaining, Remaining};
use super::rates::{current_rates, spend_summary, RateSource, SpendSummary};
use super::renewal::{self, fast_forward};
use super::repository::{StoredSubscription, SubscriptionRepository};
use crate::calendar::{Clock, CycleAdvancer, TimezoneClock};
use crate::models::{
    AppSettings, CreateSubscription, ManualRenewal, PaymentPatch, PaymentRecord, PaymentType,
    ReminderSetting, Subscription, UpdateSubscription,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    repository: SubscriptionRepository,
    clock: Arc<dyn Clock>,
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(message.into()))
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Subscription {} not found", id))
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(bad_request("Subscription name must not be empty"));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), AppError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(bad_request("Amount must not be negative"));
    }
    Ok(())
}

fn validate_period(subscription: &Subscription) -> Result<(), AppError> {
    match (subscription.period_value, subscription.period_unit) {
        (Some(0), _) => Err(bad_request("Period value must be positive")),
        (Some(_), None) | (None, Some(_)) => Err(bad_request(
            "Period value and unit must be set together",
        )),
        _ => Ok(()),
    }
}

impl SubscriptionService {
    pub fn new(repository: SubscriptionRepository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    async fn settings(&self) -> Result<(AppSettings, TimezoneClock), AppError> {
        let settings = self.repository.load_settings().await?;
        let clock = TimezoneClock::new(&settings.timezone);
        Ok((settings, clock))
    }

    /// Load, modify one subscription and save, under the repository lock.
    async fn modify<F>(&self, id: &str, apply: F) -> Result<Subscription, AppError>
    where
        F: FnOnce(&Subscription) -> Result<Subscription, AppError>,
    {
        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_all().await?;
        let slot = entries
            .iter_mut()
            .filter_map(StoredSubscription::as_valid_mut)
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(id))?;

        let updated = apply(slot)?;
        *slot = updated.clone();
        self.repository.save_all(&entries).await?;
        Ok(updated)
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AppError> {
        Ok(self.repository.load_subscriptions().await?)
    }

    pub async fn get_subscription(&self, id: &str) -> Result<Subscription, AppError> {
        self.repository
            .load_subscriptions()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Create a subscription and its `initial` payment record.
    ///
    /// Without an explicit expiry the expiry is one period after the start.
    /// A subscription that is already expired is moved past today straight
    /// away, whether or not it renews by itself.
    pub async fn create_subscription(
        &self,
        input: CreateSubscription,
    ) -> Result<Subscription, AppError> {
        validate_name(&input.name)?;
        validate_amount(input.amount)?;

        let now = self.clock.now();
        let (settings, clock) = self.settings().await?;
        let today = clock.local_date(now);
        let start = input.start_date.unwrap_or(today);

        let mut subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            category: input.category,
            notes: input.notes,
            start_date: Some(start),
            expiry_date: start,
            period_value: input.period_value,
            period_unit: input.period_unit,
            use_lunar_cycle: input.use_lunar_cycle,
            subscription_mode: input.subscription_mode,
            auto_renew: input.auto_renew.unwrap_or(true),
            is_active: true,
            reminder_unit: None,
            reminder_value: None,
            reminder_days: None,
            reminder_hours: None,
            amount: input.amount,
            currency: input
                .currency
                .filter(|c| !c.trim().is_empty())
                .map(|c| c.trim().to_ascii_uppercase())
                .unwrap_or_else(|| settings.base_currency.clone()),
            last_payment_date: Some(now),
            payment_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        validate_period(&subscription)?;
        subscription.set_reminder(
            input
                .reminder
                .unwrap_or_else(|| ReminderSetting::days(settings.default_reminder_days)),
        );

        subscription.expiry_date = match (input.expiry_date, subscription.period()) {
            (Some(expiry), _) => expiry,
            (None, Some((value, unit))) => {
                let mut advancer = CycleAdvancer::new(subscription.calendar_kind());
                advancer
                    .add_period(start, value, unit)
                    .map_err(|e| bad_request(e.to_string()))?
            }
            (None, None) => {
                return Err(bad_request("Either an expiry date or a period is required"));
            }
        };

        if subscription.period().is_some() {
            if let Some(catch_up) = fast_forward(&subscription, now, &clock)? {
                tracing::info!(
                    name = %subscription.name,
                    given_expiry = %subscription.expiry_date,
                    new_expiry = %catch_up.end,
                    periods = catch_up.periods,
                    "New subscription was already expired, fast-forwarded"
                );
                subscription.start_date = Some(catch_up.last_base);
                subscription.expiry_date = catch_up.end;
            }
        }

        subscription.payment_history.push(PaymentRecord::new(
            PaymentType::Initial,
            now,
            subscription.amount,
            "Initial subscription",
            subscription.origin_date(),
            subscription.expiry_date,
        ));

        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_all().await?;
        entries.push(StoredSubscription::Valid(subscription.clone()));
        self.repository.save_all(&entries).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            name = %subscription.name,
            expiry = %subscription.expiry_date,
            lunar = subscription.use_lunar_cycle,
            "Subscription created"
        );
        Ok(subscription)
    }

    pub async fn update_subscription(
        &self,
        id: &str,
        input: UpdateSubscription,
    ) -> Result<Subscription, AppError> {
        let now = self.clock.now();
        self.modify(id, |current| {
            let mut updated = current.clone();
            if let Some(name) = input.name {
                validate_name(&name)?;
                updated.name = name.trim().to_string();
            }
            if let Some(amount) = input.amount {
                validate_amount(amount)?;
                updated.amount = amount;
            }
            if input.category.is_some() {
                updated.category = input.category;
            }
            if input.notes.is_some() {
                updated.notes = input.notes;
            }
            if input.start_date.is_some() {
                updated.start_date = input.start_date;
            }
            if let Some(expiry) = input.expiry_date {
                updated.expiry_date = expiry;
            }
            if input.period_value.is_some() {
                updated.period_value = input.period_value;
            }
            if input.period_unit.is_some() {
                updated.period_unit = input.period_unit;
            }
            if let Some(lunar) = input.use_lunar_cycle {
                updated.use_lunar_cycle = lunar;
            }
            if let Some(mode) = input.subscription_mode {
                updated.subscription_mode = mode;
            }
            if let Some(auto_renew) = input.auto_renew {
                updated.auto_renew = auto_renew;
            }
            if let Some(reminder) = input.reminder {
                updated.set_reminder(reminder);
            }
            if let Some(currency) = input.currency.filter(|c| !c.trim().is_empty()) {
                updated.currency = currency.trim().to_ascii_uppercase();
            }
            validate_period(&updated)?;
            updated.updated_at = now;
            Ok(updated)
        })
        .await
    }

    pub async fn toggle_active(&self, id: &str, active: bool) -> Result<Subscription, AppError> {
        let now = self.clock.now();
        let updated = self
            .modify(id, |current| {
                let mut updated = current.clone();
                updated.is_active = active;
                updated.updated_at = now;
                Ok(updated)
            })
            .await?;
        tracing::info!(subscription_id = %id, active = active, "Subscription active flag changed");
        Ok(updated)
    }

    pub async fn delete_subscription(&self, id: &str) -> Result<(), AppError> {
        let _guard = self.repository.lock().await;
        let mut entries = self.repository.load_all().await?;
        let before = entries.len();
        // Malformed elements can be deleted by id too.
        entries.retain(|entry| entry.id() != Some(id));
        if entries.len() == before {
            return Err(not_found(id));
        }
        self.repository.save_all(&entries).await?;
        tracing::info!(subscription_id = %id, "Subscription deleted");
        Ok(())
    }

    pub async fn manual_renew(
        &self,
        id: &str,
        options: ManualRenewal,
    ) -> Result<(Subscription, PaymentRecord), AppError> {
        let now = self.clock.now();
        let (_, clock) = self.settings().await?;
        let mut payment = None;
        let updated = self
            .modify(id, |current| {
                let (updated, record) = renewal::manual_renew(current, &options, now, &clock)?;
                payment = Some(record);
                Ok(updated)
            })
            .await?;
        let payment = payment.ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("manual renewal produced no payment"))
        })?;

        tracing::info!(
            subscription_id = %id,
            new_expiry = %updated.expiry_date,
            amount = %payment.amount,
            "Subscription manually renewed"
        );
        Ok((updated, payment))
    }

    pub async fn edit_payment(
        &self,
        id: &str,
        payment_id: &str,
        patch: PaymentPatch,
    ) -> Result<Subscription, AppError> {
        let now = self.clock.now();
        self.modify(id, |current| {
            Ok(renewal::edit_payment(current, payment_id, &patch, now)?)
        })
        .await
    }

    pub async fn delete_payment(
        &self,
        id: &str,
        payment_id: &str,
    ) -> Result<Subscription, AppError> {
        let now = self.clock.now();
        let updated = self
            .modify(id, |current| Ok(renewal::delete_payment(current, payment_id, now)?))
            .await?;
        tracing::info!(
            subscription_id = %id,
            payment_id = %payment_id,
            expiry = %updated.expiry_date,
            "Payment record deleted, expiry recomputed"
        );
        Ok(updated)
    }

    /// Time left for one subscription in the configured timezone.
    pub async fn remaining(&self, id: &str) -> Result<Remaining, AppError> {
        let subscription = self.get_subscription(id).await?;
        let (_, clock) = self.settings().await?;
        Ok(remaining(&subscription, self.clock.now(), &clock))
    }

    /// Monthly spend of active subscriptions in the base currency.
    pub async fn spend_summary(&self, source: &dyn RateSource) -> Result<SpendSummary, AppError> {
        let now = self.clock.now();
        let (settings, clock) = self.settings().await?;
        let subscriptions = self.repository.load_subscriptions().await?;
        let rates = current_rates(
            &self.repository,
            source,
            &settings.base_currency,
            clock.local_date(now),
        )
        .await?;
        Ok(spend_summary(
            &subscriptions,
            &rates,
            &settings.base_currency,
            now,
            &clock,
        ))
    }

    pub async fn settings_snapshot(&self) -> Result<AppSettings, AppError> {
        Ok(self.repository.load_settings().await?)
    }

    pub async fn update_settings(&self, settings: AppSettings) -> Result<AppSettings, AppError> {
        if let Some(hour) = settings.notification_hours.iter().find(|h| **h > 23) {
            return Err(bad_request(format!("Notification hour {} is not in 0-23", hour)));
        }
        if crate::calendar::clock::parse_timezone(&settings.timezone).is_err() {
            return Err(bad_request(format!("Unknown timezone {}", settings.timezone)));
        }
        self.repository.save_settings(&settings).await?;
        Ok(settings)
    }
}
