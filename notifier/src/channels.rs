//! Delivery backends, one per channel kind.

use crate::{NotificationMessage, Severity};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use trendpost_core::{truncate_chars, ChannelKind, ChannelSettings, NotificationError};

const MAX_ERROR_BODY_CHARS: usize = 500;
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Whether `settings` carry enough to attempt delivery.
    fn is_configured(&self, settings: &ChannelSettings) -> bool;

    /// Delivers one message; the returned value is the upstream acknowledgement.
    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError>;
}

fn not_configured(kind: ChannelKind, reason: &str) -> NotificationError {
    NotificationError::ChannelNotConfigured {
        channel: kind.to_string(),
        reason: reason.to_string(),
    }
}

async fn post_json(
    client: &Client,
    kind: ChannelKind,
    url: &str,
    payload: &Value,
) -> Result<reqwest::Response, NotificationError> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| NotificationError::Transport {
            channel: kind.to_string(),
            details: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NotificationError::UpstreamStatus {
            channel: kind.to_string(),
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
        });
    }
    debug!("{} accepted notification ({})", kind, status);
    Ok(response)
}

/// Generic JSON webhook.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn is_configured(&self, settings: &ChannelSettings) -> bool {
        settings.webhook_url.is_some()
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        let url = settings
            .webhook_url
            .as_deref()
            .ok_or_else(|| not_configured(self.kind(), "webhook_url missing"))?;

        let payload = json!({
            "title": message.title,
            "message": message.message,
            "severity": message.severity.as_str(),
            "timestamp": message.created_at.to_rfc3339(),
            "metadata": message.metadata,
        });
        let response = post_json(&self.client, self.kind(), url, &payload).await?;
        // Receivers are free to answer with an empty body
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

/// Slack incoming webhook with a severity-coloured attachment.
pub struct SlackSender {
    client: Client,
}

impl SlackSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info | Severity::Success => "#36a64f",
        Severity::Warning => "#ffeb3b",
        Severity::Error => "#f44336",
        Severity::Critical => "#d32f2f",
    }
}

#[async_trait]
impl ChannelSender for SlackSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    fn is_configured(&self, settings: &ChannelSettings) -> bool {
        settings.webhook_url.is_some()
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        let url = settings
            .webhook_url
            .as_deref()
            .ok_or_else(|| not_configured(self.kind(), "Slack webhook URL missing"))?;

        let payload = json!({
            "text": message.title,
            "attachments": [{
                "color": severity_color(message.severity),
                "title": message.title,
                "text": message.message,
                "ts": message.created_at.timestamp(),
            }],
        });
        post_json(&self.client, self.kind(), url, &payload).await?;
        Ok(json!({ "status": "sent" }))
    }
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramSender {
    client: Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn credentials(settings: &ChannelSettings) -> Option<(&str, &str)> {
        Some((settings.bot_token.as_deref()?, settings.chat_id.as_deref()?))
    }
}

pub fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "ℹ️",
        Severity::Success => "✅",
        Severity::Warning => "⚠️",
        Severity::Error => "❌",
        Severity::Critical => "🚨",
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn is_configured(&self, settings: &ChannelSettings) -> bool {
        Self::credentials(settings).is_some()
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        let (token, chat_id) = Self::credentials(settings)
            .ok_or_else(|| not_configured(self.kind(), "bot token or chat id missing"))?;

        let text = format!(
            "{} **{}**\n\n{}",
            severity_emoji(message.severity),
            message.title,
            message.message
        );
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let response = post_json(&self.client, self.kind(), &url, &payload).await?;
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

/// Records the message in the log instead of delivering it.
pub struct EmailSender;

#[async_trait]
impl ChannelSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn is_configured(&self, settings: &ChannelSettings) -> bool {
        settings.recipient.is_some()
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        let to = settings
            .recipient
            .as_deref()
            .ok_or_else(|| not_configured(self.kind(), "recipient missing"))?;
        info!("Email notification to {}: {}", to, message.title);
        Ok(json!({ "status": "sent", "provider": "log" }))
    }
}

/// Records the message in the log instead of delivering it.
pub struct SmsSender;

#[async_trait]
impl ChannelSender for SmsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn is_configured(&self, settings: &ChannelSettings) -> bool {
        settings.phone_number.is_some()
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        let to = settings
            .phone_number
            .as_deref()
            .ok_or_else(|| not_configured(self.kind(), "phone_number missing"))?;
        info!("SMS notification to {}: {}", to, message.title);
        Ok(json!({ "status": "sent", "provider": "log" }))
    }
}
