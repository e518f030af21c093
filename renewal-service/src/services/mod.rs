pub mod display;
pub mod evaluation;
pub mod metrics;
pub mod notifier;
pub mod rates;
pub mod reminder;
pub mod renewal;
pub mod repository;
pub mod store;
pub mod subscriptions;

use service_core::error::AppError;

pub use display::{remaining, Remaining};
pub use evaluation::{EvaluationReport, EvaluationService, Fault, RaisedReminder};
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{ChannelType, Dispatcher, MockSender, Notification, NotificationSender};
pub use rates::{
    current_rates, spend_summary, ExchangeRates, HttpRateSource, RateSource, SpendSummary,
};
pub use reminder::{evaluate_reminder, should_trigger_reminder, ReminderKind};
pub use renewal::{evaluate_subscription, Evaluation, RenewalError, Transition};
pub use repository::{StoredSubscription, SubscriptionRepository};
pub use store::{BlobStore, InMemoryStore, RedisStore, StoreError};
pub use subscriptions::SubscriptionService;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Redis(e) => AppError::RedisError(e),
            other => AppError::DatabaseError(anyhow::Error::new(other)),
        }
    }
}

impl From<RenewalError> for AppError {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::PaymentNotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            RenewalError::MalformedSubscription(_) => AppError::BadRequest(anyhow::Error::new(err)),
            RenewalError::Calendar(_) => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}

impl From<rates::RateError> for AppError {
    fn from(err: rates::RateError) -> Self {
        match err {
            rates::RateError::Store(e) => e.into(),
            rates::RateError::Fetch(msg) => AppError::BadGateway(msg),
        }
    }
}
