use super::{ChannelResponse, ChannelType, Notification, NotificationSender, NotifyError};
use crate::config::WebhookConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Generic JSON webhook.
pub struct WebhookSender {
    config: WebhookConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    subscription_id: Option<&'a str>,
    timestamp: String,
}

impl WebhookSender {
    pub fn new(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Webhook
    }

    async fn send(&self, notification: &Notification) -> Result<ChannelResponse, NotifyError> {
        if !self.config.enabled {
            return Err(NotifyError::NotEnabled(
                "Webhook channel is not enabled".to_string(),
            ));
        }
        if self.config.url.is_empty() {
            return Err(NotifyError::Configuration(
                "WEBHOOK_URL is not configured".to_string(),
            ));
        }

        let payload = WebhookPayload {
            title: &notification.title,
            content: &notification.body,
            tags: &notification.tags,
            subscription_id: notification.subscription_id.as_deref(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Connection(format!("Failed to reach webhook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::SendFailed(format!(
                "Webhook returned error status {}: {}",
                status, body
            )));
        }

        tracing::info!(title = %notification.title, "Notification sent via webhook");
        Ok(ChannelResponse::success(None))
    }

    async fn health_check(&self) -> Result<(), NotifyError> {
        if self.config.enabled && self.config.url.is_empty() {
            return Err(NotifyError::Configuration(
                "WEBHOOK_URL is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
