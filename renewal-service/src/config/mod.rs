//! Configuration module for renewal-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct RenewalConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub webhook: WebhookConfig,
    pub telegram: TelegramConfig,
    pub bark: BarkConfig,
    pub smtp: SmtpConfig,
    pub rates: RatesConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL. Unset means an in-process store that is lost on restart.
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct BarkConfig {
    pub server: String,
    pub device_key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// Endpoint returning `{"rates": {...}}` for a base currency appended to it.
    pub api_url: String,
}

impl RenewalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_prod();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "renewal-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store: StoreConfig {
                redis_url: if is_prod {
                    Some(get_env("REDIS_URL", None, is_prod)?)
                } else {
                    env::var("REDIS_URL").ok().filter(|s| !s.is_empty())
                },
                key_prefix: env::var("STORE_KEY_PREFIX")
                    .unwrap_or_else(|_| "renewal".to_string()),
            },
            scheduler: SchedulerConfig {
                interval_secs: env::var("EVALUATION_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(3600),
            },
            webhook: WebhookConfig {
                url: env::var("WEBHOOK_URL").unwrap_or_default(),
                enabled: flag("WEBHOOK_ENABLED"),
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
                enabled: flag("TELEGRAM_ENABLED"),
            },
            bark: BarkConfig {
                server: env::var("BARK_SERVER")
                    .unwrap_or_else(|_| "https://api.day.app".to_string()),
                device_key: env::var("BARK_DEVICE_KEY").unwrap_or_default(),
                enabled: flag("BARK_ENABLED"),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), false)?,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                user: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), false)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Subscription Reminders"), false)?,
                to_email: env::var("SMTP_TO_EMAIL").unwrap_or_default(),
                enabled: flag("SMTP_ENABLED"),
            },
            rates: RatesConfig {
                api_url: env::var("EXCHANGE_RATE_API_URL")
                    .unwrap_or_else(|_| "https://open.er-api.com/v6/latest".to_string()),
            },
        })
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
