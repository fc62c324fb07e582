use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content bucket with its own posting cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
    pub posting_interval_days: u32,
}

/// Where a generated document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Model,
    Fallback,
}

/// One pipeline run's output. Never stored directly, only projected into a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub title: String,
    pub body_html: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub thumbnail_data_uri: String,
    pub images: Vec<String>,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: Vec<String>,
    pub origin: ContentOrigin,
}

/// Insert projection of a [`GeneratedContent`].
#[derive(Debug, Clone)]
pub struct NewContentRow {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub thumbnail_url: String,
    pub is_published: bool,
    pub source_name: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: Vec<String>,
}

impl NewContentRow {
    pub fn from_generated(
        content: &GeneratedContent,
        slug: String,
        is_published: bool,
        source_name: &str,
    ) -> Self {
        Self {
            title: content.title.clone(),
            slug,
            content: content.body_html.clone(),
            summary: content.summary.clone(),
            category: content.category.clone(),
            tags: content.tags.clone(),
            thumbnail_url: content.thumbnail_data_uri.clone(),
            is_published,
            source_name: source_name.to_string(),
            seo_title: truncate_chars(&content.seo_title, 60),
            seo_description: truncate_chars(&content.seo_description, 160),
            seo_keywords: content.seo_keywords.iter().take(5).cloned().collect(),
        }
    }
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub thumbnail_url: String,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub is_featured: bool,
    pub source_name: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalytics {
    pub total: i64,
    pub published: i64,
    pub drafts: i64,
    pub total_views: i64,
    pub by_category: Vec<(String, i64)>,
    /// Percentage of generation and publish log entries that succeeded.
    pub generation_success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Login,
    Publish,
    Generation,
    Error,
    HealthCheck,
    Cleanup,
    Notification,
    Scheduler,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Login => "login",
            LogType::Publish => "publish",
            LogType::Generation => "generation",
            LogType::Error => "error",
            LogType::HealthCheck => "health_check",
            LogType::Cleanup => "cleanup",
            LogType::Notification => "notification",
            LogType::Scheduler => "scheduler",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(LogType::Login),
            "publish" => Some(LogType::Publish),
            "generation" => Some(LogType::Generation),
            "error" => Some(LogType::Error),
            "health_check" => Some(LogType::HealthCheck),
            "cleanup" => Some(LogType::Cleanup),
            "notification" => Some(LogType::Notification),
            "scheduler" => Some(LogType::Scheduler),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failure,
    Warning,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failure => "failure",
            LogStatus::Warning => "warning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(LogStatus::Success),
            "failure" => Some(LogStatus::Failure),
            "warning" => Some(LogStatus::Warning),
            _ => None,
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationLogEntry {
    pub log_type: LogType,
    pub status: LogStatus,
    pub message: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AutomationLogEntry {
    pub fn new(
        log_type: LogType,
        status: LogStatus,
        message: impl Into<String>,
        metadata: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            log_type,
            status,
            message: message.into(),
            metadata,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Webhook,
    Slack,
    #[serde(alias = "chat")]
    Telegram,
    Sms,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Email => "email",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Slack => "slack",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Sms => "sms",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// One notification destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default)]
    pub config: ChannelSettings,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Truncates on a char boundary.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
