use super::{ChannelResponse, ChannelType, Notification, NotificationSender, NotifyError};
use crate::config::BarkConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// iOS push through a Bark server.
pub struct BarkSender {
    config: BarkConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct BarkRequest<'a> {
    device_key: &'a str,
    title: &'a str,
    body: &'a str,
    group: &'static str,
}

#[derive(Debug, Deserialize)]
struct BarkResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

impl BarkSender {
    pub fn new(config: BarkConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl NotificationSender for BarkSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Bark
    }

    async fn send(&self, notification: &Notification) -> Result<ChannelResponse, NotifyError> {
        if !self.config.enabled {
            return Err(NotifyError::NotEnabled(
                "Bark channel is not enabled".to_string(),
            ));
        }
        if self.config.device_key.is_empty() {
            return Err(NotifyError::Configuration(
                "BARK_DEVICE_KEY is not configured".to_string(),
            ));
        }

        let url = format!("{}/push", self.config.server.trim_end_matches('/'));
        let request = BarkRequest {
            device_key: &self.config.device_key,
            title: &notification.title,
            body: &notification.body,
            group: "subscriptions",
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Connection(format!("Failed to connect to Bark: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::SendFailed(format!(
                "Bark returned error status {}: {}",
                status, body
            )));
        }

        let parsed: BarkResponse = response.json().await.map_err(|e| {
            NotifyError::SendFailed(format!("Failed to parse Bark response: {}", e))
        })?;
        if parsed.code != 200 {
            return Err(NotifyError::SendFailed(format!(
                "Bark error ({}): {}",
                parsed.code, parsed.message
            )));
        }

        tracing::info!(title = %notification.title, "Notification sent via Bark");
        Ok(ChannelResponse::success(None))
    }

    async fn health_check(&self) -> Result<(), NotifyError> {
        if self.config.enabled && self.config.device_key.is_empty() {
            return Err(NotifyError::Configuration(
                "BARK_DEVICE_KEY is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
