#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use renewal_service::calendar::{Clock, PeriodUnit};
use renewal_service::config::{
    BarkConfig, RatesConfig, RenewalConfig, SchedulerConfig, SmtpConfig, StoreConfig,
    TelegramConfig, WebhookConfig,
};
use renewal_service::models::{AppSettings, CreateSubscription, SubscriptionMode};
use renewal_service::services::{
    ChannelType, Dispatcher, EvaluationService, InMemoryStore, MockSender, SubscriptionService,
};
use renewal_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use std::sync::{Arc, Mutex};

/// Clock the test moves by hand.
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config() -> RenewalConfig {
    RenewalConfig {
        common: CoreConfig {
            port: 0,
            environment: "test".to_string(),
        },
        service_name: "renewal-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            redis_url: None,
            key_prefix: format!("renewal_test_{}", uuid::Uuid::new_v4()),
        },
        scheduler: SchedulerConfig {
            interval_secs: 3600,
        },
        webhook: WebhookConfig {
            url: String::new(),
            enabled: false,
        },
        telegram: TelegramConfig {
            bot_token: String::new(),
            chat_id: String::new(),
            enabled: false,
        },
        bark: BarkConfig {
            server: "https://api.day.app".to_string(),
            device_key: String::new(),
            enabled: false,
        },
        smtp: SmtpConfig {
            host: "smtp.test.local".to_string(),
            port: 587,
            user: "test".to_string(),
            password: "test".to_string(),
            from_email: "test@example.com".to_string(),
            from_name: "Test Service".to_string(),
            to_email: "owner@example.com".to_string(),
            enabled: false, // Use mock
        },
        rates: RatesConfig {
            api_url: "http://127.0.0.1:9/rates".to_string(),
        },
    }
}

pub struct TestApp {
    pub subscriptions: SubscriptionService,
    pub evaluation: EvaluationService,
    pub clock: Arc<TestClock>,
    pub sender: Arc<MockSender>,
    /// The store behind the services, for reading and seeding raw blobs.
    pub store: Arc<InMemoryStore>,
    pub key_prefix: String,
    app: Option<Application>,
    pub http_address: String,
}

impl TestApp {
    /// Services wired to an in-memory store, a recording webhook sender and
    /// a clock frozen at `now`. The scheduler is not started.
    pub async fn new(now: DateTime<Utc>) -> Self {
        let clock = Arc::new(TestClock::new(now));
        let sender = Arc::new(MockSender::new(ChannelType::Webhook, true));
        let dispatcher = Dispatcher::default().with_sender(sender.clone());
        let store = Arc::new(InMemoryStore::new());
        let config = test_config();
        let key_prefix = config.store.key_prefix.clone();

        let app = Application::build_with(
            config,
            store.clone(),
            dispatcher,
            clock.clone(),
        )
        .await
        .expect("Failed to build test application");

        let http_address = format!("http://127.0.0.1:{}", app.port());

        Self {
            subscriptions: app.subscriptions().clone(),
            evaluation: app.evaluation().clone(),
            clock,
            sender,
            store,
            key_prefix,
            app: Some(app),
            http_address,
        }
    }

    /// Like [`TestApp::new`], with the HTTP server and scheduler running.
    pub async fn spawn(now: DateTime<Utc>) -> Self {
        let mut test_app = Self::new(now).await;
        if let Some(app) = test_app.app.take() {
            tokio::spawn(async move {
                app.run_until_stopped().await.ok();
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        test_app
    }

    pub async fn use_settings(&self, settings: AppSettings) {
        self.subscriptions
            .update_settings(settings)
            .await
            .expect("Failed to save settings");
    }

    pub async fn use_timezone(&self, timezone: &str) {
        self.use_settings(AppSettings {
            timezone: timezone.to_string(),
            ..AppSettings::default()
        })
        .await;
    }
}

/// A monthly, cycle-mode, auto-renewing subscription input.
pub fn monthly(name: &str, start: NaiveDate, expiry: NaiveDate) -> CreateSubscription {
    CreateSubscription {
        name: name.to_string(),
        start_date: Some(start),
        expiry_date: Some(expiry),
        period_value: Some(1),
        period_unit: Some(PeriodUnit::Month),
        subscription_mode: SubscriptionMode::Cycle,
        auto_renew: Some(true),
        amount: Decimal::new(1500, 2),
        currency: Some("USD".to_string()),
        ..CreateSubscription::default()
    }
}
