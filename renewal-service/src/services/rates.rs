//! Exchange rates and the monthly spend summary.

use super::repository::SubscriptionRepository;
use super::store::StoreError;
use crate::calendar::{PeriodUnit, TimezoneClock};
use crate::models::Subscription;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Days counted as "expiring soon" in the summary.
const EXPIRING_SOON_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("Failed to fetch exchange rates: {0}")]
    Fetch(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rates relative to `base`, valid for one local day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    pub date: NaiveDate,
    /// Units of each currency per one unit of `base`.
    pub rates: HashMap<String, Decimal>,
}

impl ExchangeRates {
    fn rate(&self, currency: &str) -> Option<Decimal> {
        if currency.eq_ignore_ascii_case(&self.base) {
            return Some(Decimal::ONE);
        }
        self.rates
            .get(&currency.to_ascii_uppercase())
            .copied()
            .filter(|r| !r.is_zero())
    }

    /// Convert between any two listed currencies. `None` when either is
    /// unknown.
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Option<Decimal> {
        if from.eq_ignore_ascii_case(to) {
            return Some(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        amount
            .checked_div(from_rate)
            .and_then(|in_base| in_base.checked_mul(to_rate))
    }
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self, base: &str) -> Result<HashMap<String, Decimal>, RateError>;
}

/// Rate source backed by a public JSON API (`{url}/{base}` returning
/// `{"rates": {...}}`).
pub struct HttpRateSource {
    url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, Decimal>,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self, base: &str) -> Result<HashMap<String, Decimal>, RateError> {
        let url = format!("{}/{}", self.url.trim_end_matches('/'), base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RateError::Fetch(format!(
                "rate API returned status {}",
                response.status()
            )));
        }

        let parsed: RatesResponse = response
            .json()
            .await
            .map_err(|e| RateError::Fetch(format!("invalid rate payload: {}", e)))?;
        Ok(parsed.rates)
    }
}

/// Rates for `base` as of the local day `today`.
///
/// The cached copy is used while its date and base match. A failed refresh
/// falls back to a stale cache for the same base.
pub async fn current_rates(
    repository: &SubscriptionRepository,
    source: &dyn RateSource,
    base: &str,
    today: NaiveDate,
) -> Result<ExchangeRates, RateError> {
    let cached = repository.load_rates().await?;
    if let Some(rates) = &cached {
        if rates.date == today && rates.base.eq_ignore_ascii_case(base) {
            return Ok(rates.clone());
        }
    }

    match source.fetch(base).await {
        Ok(rates) => {
            let fresh = ExchangeRates {
                base: base.to_ascii_uppercase(),
                date: today,
                rates,
            };
            repository.save_rates(&fresh).await?;
            tracing::info!(base = %fresh.base, date = %today, "Exchange rates refreshed");
            Ok(fresh)
        }
        Err(e) => match cached.filter(|r| r.base.eq_ignore_ascii_case(base)) {
            Some(stale) => {
                tracing::warn!(error = %e, cached_date = %stale.date, "Using stale exchange rates");
                Ok(stale)
            }
            None => Err(e),
        },
    }
}

/// Cost of a subscription per month, in its own currency.
///
/// Day periods count a month as 30 days.
pub fn monthly_equivalent(subscription: &Subscription) -> Option<Decimal> {
    let (value, unit) = subscription.period()?;
    let n = Decimal::from(value);
    let monthly = match unit {
        PeriodUnit::Day => subscription.amount * Decimal::from(30) / n,
        PeriodUnit::Month => subscription.amount / n,
        PeriodUnit::Year => subscription.amount / (Decimal::from(12) * n),
    };
    Some(monthly)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSummary {
    pub base_currency: String,
    pub monthly_total: Decimal,
    pub active_count: usize,
    pub expired_count: usize,
    pub expiring_soon_count: usize,
    /// Currencies with no known rate; their subscriptions are left out of the total.
    pub skipped_currencies: Vec<String>,
}

pub fn spend_summary(
    subscriptions: &[Subscription],
    rates: &ExchangeRates,
    base_currency: &str,
    now: DateTime<Utc>,
    clock: &TimezoneClock,
) -> SpendSummary {
    let mut summary = SpendSummary {
        base_currency: base_currency.to_string(),
        monthly_total: Decimal::ZERO,
        active_count: 0,
        expired_count: 0,
        expiring_soon_count: 0,
        skipped_currencies: Vec::new(),
    };

    for subscription in subscriptions.iter().filter(|s| s.is_active) {
        summary.active_count += 1;

        let days = clock.days_until(subscription.expiry_date, now);
        if days < 0 {
            summary.expired_count += 1;
        } else if days <= EXPIRING_SOON_DAYS {
            summary.expiring_soon_count += 1;
        }

        let Some(monthly) = monthly_equivalent(subscription) else {
            continue;
        };
        match rates.convert(monthly, &subscription.currency, base_currency) {
            Some(converted) => summary.monthly_total += converted,
            None => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    currency = %subscription.currency,
                    "No exchange rate for currency, leaving it out of the summary"
                );
                if !summary.skipped_currencies.contains(&subscription.currency) {
                    summary.skipped_currencies.push(subscription.currency.clone());
                }
            }
        }
    }

    summary.monthly_total = summary.monthly_total.round_dp(2);
    summary
}
