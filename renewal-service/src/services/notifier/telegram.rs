use super::{ChannelResponse, ChannelType, Notification, NotificationSender, NotifyError};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub struct TelegramSender {
    config: TelegramConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn check_config(&self) -> Result<(), NotifyError> {
        if self.config.bot_token.is_empty() || self.config.chat_id.is_empty() {
            return Err(NotifyError::Configuration(
                "Telegram bot token and chat id are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Telegram
    }

    async fn send(&self, notification: &Notification) -> Result<ChannelResponse, NotifyError> {
        if !self.config.enabled {
            return Err(NotifyError::NotEnabled(
                "Telegram channel is not enabled".to_string(),
            ));
        }
        self.check_config()?;

        let request = SendMessageRequest {
            chat_id: &self.config.chat_id,
            text: format!("{}\n\n{}", notification.title, notification.body),
            disable_web_page_preview: true,
        };
        let url = format!(
            "{}/bot{}/sendMessage",
            TELEGRAM_API_URL, self.config.bot_token
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                NotifyError::Connection(format!("Failed to connect to Telegram: {}", e))
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(NotifyError::Authentication(
                "Telegram rejected the bot token".to_string(),
            ));
        }
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::InvalidRecipient(format!(
                "Telegram rejected chat {}: {}",
                self.config.chat_id, body
            )));
        }

        let parsed: TelegramResponse = response.json().await.map_err(|e| {
            NotifyError::SendFailed(format!("Failed to parse Telegram response: {}", e))
        })?;

        if !parsed.ok {
            return Err(NotifyError::SendFailed(
                parsed
                    .description
                    .unwrap_or_else(|| "Telegram returned ok=false".to_string()),
            ));
        }

        tracing::info!(
            chat_id = %self.config.chat_id,
            title = %notification.title,
            "Notification sent via Telegram"
        );

        Ok(ChannelResponse::success(
            parsed.result.map(|m| m.message_id.to_string()),
        ))
    }

    async fn health_check(&self) -> Result<(), NotifyError> {
        if !self.config.enabled {
            return Ok(());
        }
        self.check_config()
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
