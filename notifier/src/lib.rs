//! Multi-channel notification dispatch with templates, an hourly send limit
//! and a retry queue.

pub mod channels;
pub mod template;

pub use channels::{
    ChannelSender, EmailSender, SlackSender, SmsSender, TelegramSender, WebhookSender,
};
pub use template::{builtin_templates, find_template, NotificationTemplate};

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Offset, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use trendpost_core::{
    AutomationLogEntry, AutomationLogStore, ChannelConfig, ChannelKind, Clock, ErrorExt,
    LogStatus, LogType, NotificationError, NotificationSettings,
};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_QUEUE_SPACING: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Severity::Info),
            "success" => Some(Severity::Success),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub channels: Vec<ChannelConfig>,
    pub metadata: Value,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub message_id: String,
    pub channel: ChannelKind,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub message_id: Option<String>,
    pub results: Vec<NotificationResult>,
    /// At least one channel delivered.
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub processed: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierStatus {
    pub enabled: bool,
    pub queue_size: usize,
    pub rate_limit_remaining: u32,
    pub last_reset: DateTime<Utc>,
    pub configured_channels: usize,
}

struct RateWindow {
    count: u32,
    started_at: DateTime<Utc>,
}

pub struct Notifier {
    settings: NotificationSettings,
    senders: HashMap<ChannelKind, Arc<dyn ChannelSender>>,
    log_store: Option<Arc<dyn AutomationLogStore>>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    queue_spacing: Duration,
    window: Mutex<RateWindow>,
    queue: Mutex<VecDeque<NotificationMessage>>,
}

impl Notifier {
    /// Notifier with the built-in senders for every channel kind.
    pub fn new(
        settings: NotificationSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::Transport {
                channel: "http".to_string(),
                details: e.to_string(),
            })?;

        let senders: Vec<Arc<dyn ChannelSender>> = vec![
            Arc::new(WebhookSender::new(client.clone())),
            Arc::new(SlackSender::new(client.clone())),
            Arc::new(TelegramSender::new(client)),
            Arc::new(EmailSender),
            Arc::new(SmsSender),
        ];
        Ok(Self::with_senders(settings, clock, senders))
    }

    pub fn with_senders(
        settings: NotificationSettings,
        clock: Arc<dyn Clock>,
        senders: Vec<Arc<dyn ChannelSender>>,
    ) -> Self {
        let started_at = clock.now();
        Self {
            settings,
            senders: senders.into_iter().map(|s| (s.kind(), s)).collect(),
            log_store: None,
            clock,
            utc_offset: Utc.fix(),
            queue_spacing: DEFAULT_QUEUE_SPACING,
            window: Mutex::new(RateWindow {
                count: 0,
                started_at,
            }),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_log_store(mut self, store: Arc<dyn AutomationLogStore>) -> Self {
        self.log_store = Some(store);
        self
    }

    /// Offset used for `{{timestamp}}` in rendered messages.
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(hours * 3600) {
            self.utc_offset = offset;
        }
        self
    }

    pub fn with_queue_spacing(mut self, spacing: Duration) -> Self {
        self.queue_spacing = spacing;
        self
    }

    pub fn configured_channels(&self) -> &[ChannelConfig] {
        &self.settings.channels
    }

    /// Whether a sender exists for the channel and its settings are usable.
    pub fn validate_channel(&self, channel: &ChannelConfig) -> bool {
        self.senders
            .get(&channel.kind)
            .map_or(false, |sender| sender.is_configured(&channel.config))
    }

    /// Renders a template into a message addressed to `channels`
    /// (the configured channels when `None`).
    pub fn render_template(
        &self,
        template_id: &str,
        data: &Value,
        channels: Option<&[ChannelConfig]>,
    ) -> Result<NotificationMessage, NotificationError> {
        let template =
            find_template(template_id).ok_or_else(|| NotificationError::TemplateNotFound {
                template_id: template_id.to_string(),
            })?;

        let now = self.clock.now();
        let timestamp = now
            .with_timezone(&self.utc_offset)
            .format("%Y. %-m. %-d. %H:%M:%S")
            .to_string();

        Ok(NotificationMessage {
            id: None,
            title: template::render(template.title, data, &timestamp),
            message: template::render(template.message, data, &timestamp),
            severity: data
                .get("severity")
                .and_then(Value::as_str)
                .and_then(Severity::parse)
                .unwrap_or_default(),
            channels: channels
                .map(<[ChannelConfig]>::to_vec)
                .unwrap_or_else(|| self.settings.channels.clone()),
            metadata: data.get("metadata").cloned().unwrap_or(Value::Null),
            retry_count: 0,
            created_at: now,
        })
    }

    /// Renders and sends a templated notification.
    pub async fn notify(
        &self,
        template_id: &str,
        data: &Value,
        channels: Option<&[ChannelConfig]>,
    ) -> Result<NotificationReport, NotificationError> {
        let message = self.render_template(template_id, data, channels)?;
        Ok(self.send(message).await)
    }

    /// Sends to every enabled channel concurrently. Never fails as a whole;
    /// per-channel failures are in the report.
    pub async fn send(&self, message: NotificationMessage) -> NotificationReport {
        if !self.settings.enabled {
            debug!("Notifications disabled, dropping '{}'", message.title);
            return NotificationReport::default();
        }
        if let Err(e) = self.take_rate_slot() {
            e.log_warn();
            return NotificationReport::default();
        }

        let message_id = message.id.clone().unwrap_or_else(|| self.next_message_id());
        let targets: Vec<&ChannelConfig> = message.channels.iter().filter(|c| c.enabled).collect();
        info!(
            "Sending notification {} '{}' to {} channel(s)",
            message_id,
            message.title,
            targets.len()
        );

        let results = join_all(
            targets
                .into_iter()
                .map(|channel| self.deliver(&message_id, &message, channel)),
        )
        .await;

        self.log_outcome(&message_id, &message, &results).await;

        let delivered = results.iter().filter(|r| r.success).count();
        info!(
            "Notification {} delivered to {}/{} channel(s)",
            message_id,
            delivered,
            results.len()
        );

        NotificationReport {
            message_id: Some(message_id),
            success: delivered > 0,
            results,
        }
    }

    async fn deliver(
        &self,
        message_id: &str,
        message: &NotificationMessage,
        channel: &ChannelConfig,
    ) -> NotificationResult {
        let started = Instant::now();
        let outcome = match self.senders.get(&channel.kind) {
            None => Err(NotificationError::UnsupportedChannel {
                channel: channel.kind.to_string(),
            }),
            Some(sender) if !sender.is_configured(&channel.config) => {
                Err(NotificationError::ChannelNotConfigured {
                    channel: channel.kind.to_string(),
                    reason: "missing channel settings".to_string(),
                })
            }
            Some(sender) => sender.send(message, &channel.config).await,
        };

        let error = match outcome {
            Ok(_) => None,
            Err(e) => {
                e.log_warn();
                Some(e.to_string())
            }
        };

        NotificationResult {
            message_id: message_id.to_string(),
            channel: channel.kind,
            success: error.is_none(),
            error,
            sent_at: self.clock.now(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn take_rate_slot(&self) -> Result<(), NotificationError> {
        let limit = self.settings.rate_limit_per_hour;
        let now = self.clock.now();
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if now - window.started_at >= ChronoDuration::hours(1) {
            window.count = 0;
            window.started_at = now;
        }
        if window.count >= limit {
            return Err(NotificationError::RateLimited { limit });
        }
        window.count += 1;
        Ok(())
    }

    fn next_message_id(&self) -> String {
        let suffix: String = (0..9)
            .map(|_| fastrand::alphanumeric().to_ascii_lowercase())
            .collect();
        format!("msg_{}_{}", self.clock.now().timestamp_millis(), suffix)
    }

    async fn log_outcome(
        &self,
        message_id: &str,
        message: &NotificationMessage,
        results: &[NotificationResult],
    ) {
        let Some(store) = &self.log_store else {
            return;
        };

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        let status = if results.is_empty() {
            LogStatus::Warning
        } else if failed == 0 {
            LogStatus::Success
        } else if succeeded == 0 {
            LogStatus::Failure
        } else {
            LogStatus::Warning
        };

        let entry = AutomationLogEntry::new(
            LogType::Notification,
            status,
            format!("알림 발송: {}", message.title),
            json!({
                "message_id": message_id,
                "severity": message.severity.as_str(),
                "channels_total": results.len(),
                "channels_success": succeeded,
                "channels_failure": failed,
                "results": results
                    .iter()
                    .map(|r| json!({ "channel": r.channel, "success": r.success, "error": r.error }))
                    .collect::<Vec<_>>(),
            }),
            self.clock.now(),
        );

        if let Err(e) = store.append_log(&entry).await {
            e.log_warn();
        }
    }

    /// Holds a message for the next [`process_queue`](Self::process_queue) run.
    pub fn queue(&self, mut message: NotificationMessage) {
        if message.id.is_none() {
            message.id = Some(self.next_message_id());
        }
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queue.push_back(message);
        debug!("Notification queued ({} pending)", queue.len());
    }

    /// Sends everything queued so far. Undelivered messages go back on the
    /// queue until they have been retried `max_retries` times.
    pub async fn process_queue(&self) -> QueueReport {
        let mut report = QueueReport::default();
        if !self.settings.enabled {
            return report;
        }

        let pending: Vec<NotificationMessage> = {
            let mut queue = self
                .queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return report;
        }
        info!("Processing {} queued notification(s)", pending.len());

        let mut retry = Vec::new();
        for (index, mut message) in pending.into_iter().enumerate() {
            if index > 0 && !self.queue_spacing.is_zero() {
                tokio::time::sleep(self.queue_spacing).await;
            }
            report.processed += 1;

            if self.send(message.clone()).await.success {
                report.delivered += 1;
            } else if message.retry_count < self.settings.max_retries {
                message.retry_count += 1;
                retry.push(message);
                report.requeued += 1;
            } else {
                warn!(
                    "Dropping notification '{}' after {} retries",
                    message.title, message.retry_count
                );
                report.dropped += 1;
            }
        }

        if !retry.is_empty() {
            let mut queue = self
                .queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            queue.extend(retry);
        }
        report
    }

    pub fn status(&self) -> NotifierStatus {
        let (count, last_reset) = {
            let window = self
                .window
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (window.count, window.started_at)
        };
        let queue_size = self
            .queue
            .lock()
            .map(|q| q.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());

        NotifierStatus {
            enabled: self.settings.enabled,
            queue_size,
            rate_limit_remaining: self.settings.rate_limit_per_hour.saturating_sub(count),
            last_reset,
            configured_channels: self
                .settings
                .channels
                .iter()
                .filter(|c| c.enabled && self.validate_channel(c))
                .count(),
        }
    }
}
