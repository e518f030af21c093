//! JSON persistence of subscriptions, settings and cached rates.

use super::rates::ExchangeRates;
use super::store::{BlobStore, StoreError};
use crate::models::{AppSettings, Subscription};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// One element of the stored subscription list.
///
/// Elements that no longer decode are carried as raw JSON so that saving the
/// list back does not lose them.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSubscription {
    Valid(Subscription),
    Malformed { raw: Value, error: String },
}

impl StoredSubscription {
    fn decode(raw: Value) -> Self {
        match serde_json::from_value::<Subscription>(raw.clone()) {
            Ok(subscription) => StoredSubscription::Valid(subscription),
            Err(e) => StoredSubscription::Malformed {
                raw,
                error: e.to_string(),
            },
        }
    }

    fn encode(&self) -> Result<Value, serde_json::Error> {
        match self {
            StoredSubscription::Valid(subscription) => serde_json::to_value(subscription),
            StoredSubscription::Malformed { raw, .. } => Ok(raw.clone()),
        }
    }

    /// Id of the element, read from the raw JSON for malformed ones.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoredSubscription::Valid(subscription) => Some(&subscription.id),
            StoredSubscription::Malformed { raw, .. } => raw.get("id").and_then(Value::as_str),
        }
    }

    pub fn as_valid(&self) -> Option<&Subscription> {
        match self {
            StoredSubscription::Valid(subscription) => Some(subscription),
            StoredSubscription::Malformed { .. } => None,
        }
    }

    pub fn as_valid_mut(&mut self) -> Option<&mut Subscription> {
        match self {
            StoredSubscription::Valid(subscription) => Some(subscription),
            StoredSubscription::Malformed { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    store: Arc<dyn BlobStore>,
    prefix: String,
    write_lock: Arc<Mutex<()>>,
}

impl SubscriptionRepository {
    pub fn new(store: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serialises read-modify-write cycles on the subscription list within
    /// this process.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    /// Every stored element, decoded one by one. A missing blob is an empty
    /// list; only a blob that is not a JSON array fails as a whole.
    pub async fn load_all(&self) -> Result<Vec<StoredSubscription>, StoreError> {
        let raw: Vec<Value> = match self.store.get(&self.key("subscriptions")).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => return Ok(Vec::new()),
        };

        let entries: Vec<StoredSubscription> =
            raw.into_iter().map(StoredSubscription::decode).collect();
        for entry in &entries {
            if let StoredSubscription::Malformed { error, .. } = entry {
                tracing::warn!(
                    subscription_id = entry.id().unwrap_or("unknown"),
                    error = %error,
                    "Stored subscription could not be decoded"
                );
            }
        }
        Ok(entries)
    }

    /// Write the whole list back, malformed elements unchanged.
    pub async fn save_all(&self, entries: &[StoredSubscription]) -> Result<(), StoreError> {
        let values = entries
            .iter()
            .map(StoredSubscription::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let raw = serde_json::to_string(&values)?;
        self.store.put(&self.key("subscriptions"), &raw).await
    }

    /// Subscriptions that decode cleanly.
    pub async fn load_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                StoredSubscription::Valid(subscription) => Some(subscription),
                StoredSubscription::Malformed { .. } => None,
            })
            .collect())
    }

    /// Settings, or the defaults when none were saved.
    pub async fn load_settings(&self) -> Result<AppSettings, StoreError> {
        match self.store.get(&self.key("settings")).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(AppSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<(), StoreError> {
        let raw = serde_json::to_string(settings)?;
        self.store.put(&self.key("settings"), &raw).await
    }

    pub async fn load_rates(&self) -> Result<Option<ExchangeRates>, StoreError> {
        match self.store.get(&self.key("exchange_rates")).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save_rates(&self, rates: &ExchangeRates) -> Result<(), StoreError> {
        let raw = serde_json::to_string(rates)?;
        self.store.put(&self.key("exchange_rates"), &raw).await
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}
