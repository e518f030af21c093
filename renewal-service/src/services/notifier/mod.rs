pub mod bark;
pub mod compose;
pub mod email;
pub mod telegram;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use bark::BarkSender;
pub use compose::{compose_reminder, compose_renewal};
pub use email::SmtpSender;
pub use telegram::TelegramSender;
pub use webhook::WebhookSender;

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Webhook,
    Telegram,
    Bark,
    Email,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Webhook => "webhook",
            ChannelType::Telegram => "telegram",
            ChannelType::Bark => "bark",
            ChannelType::Email => "email",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Channel not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub provider_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl ChannelResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
            message: None,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            provider_id: None,
            success: false,
            message: Some(message),
        }
    }
}

/// A rendered notice, ready for any channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> ChannelType;
    async fn send(&self, notification: &Notification) -> Result<ChannelResponse, NotifyError>;
    async fn health_check(&self) -> Result<(), NotifyError>;
    fn is_enabled(&self) -> bool;
}

/// Per-channel outcome of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub results: Vec<(ChannelType, ChannelResponse)>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.success).count()
    }

    pub fn any_delivered(&self) -> bool {
        self.delivered() > 0
    }
}

/// Fans a notification out to every sender whose channel is enabled.
#[derive(Clone, Default)]
pub struct Dispatcher {
    senders: Vec<Arc<dyn NotificationSender>>,
}

impl Dispatcher {
    pub fn new(senders: Vec<Arc<dyn NotificationSender>>) -> Self {
        Self { senders }
    }

    pub fn with_sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.senders.push(sender);
        self
    }

    /// Channels a sender is configured for.
    pub fn channels(&self) -> Vec<ChannelType> {
        self.senders
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.channel())
            .collect()
    }

    /// Send to every configured sender listed in `enabled`. An empty list
    /// means every configured sender. A failing channel never stops the
    /// others.
    pub async fn dispatch(
        &self,
        notification: &Notification,
        enabled: &[ChannelType],
    ) -> DispatchReport {
        let mut results = Vec::new();

        for sender in &self.senders {
            let channel = sender.channel();
            if !sender.is_enabled() || (!enabled.is_empty() && !enabled.contains(&channel)) {
                continue;
            }

            let response = match sender.send(notification).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        title = %notification.title,
                        error = %e,
                        "Notification delivery failed"
                    );
                    ChannelResponse::failure(e.to_string())
                }
            };
            crate::services::metrics::record_notification(
                channel.as_str(),
                if response.success { "success" } else { "failure" },
            );
            results.push((channel, response));
        }

        if results.is_empty() {
            tracing::debug!(title = %notification.title, "No notification channel enabled");
        }

        DispatchReport { results }
    }

    pub async fn health_check(&self) -> Result<(), NotifyError> {
        for sender in &self.senders {
            sender.health_check().await?;
        }
        Ok(())
    }
}

/// Sender that records notifications instead of delivering them.
pub struct MockSender {
    channel: ChannelType,
    enabled: bool,
    fail: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<Notification>>,
}

impl MockSender {
    pub fn new(channel: ChannelType, enabled: bool) -> Self {
        Self {
            channel,
            enabled,
            fail: false,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A sender whose every delivery fails.
    pub fn failing(channel: ChannelType) -> Self {
        Self {
            fail: true,
            ..Self::new(channel, true)
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    fn channel(&self) -> ChannelType {
        self.channel
    }

    async fn send(&self, notification: &Notification) -> Result<ChannelResponse, NotifyError> {
        if !self.enabled {
            return Err(NotifyError::NotEnabled(format!(
                "Mock {} sender is not enabled",
                self.channel
            )));
        }
        if self.fail {
            return Err(NotifyError::SendFailed(format!(
                "Mock {} sender rejected the message",
                self.channel
            )));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }

        tracing::info!(
            channel = %self.channel,
            title = %notification.title,
            "[MOCK] Notification would be sent"
        );

        Ok(ChannelResponse::success(Some(format!(
            "mock-{}-{}",
            self.channel,
            self.send_count.load(Ordering::SeqCst)
        ))))
    }

    async fn health_check(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
