//! Application configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables. A missing file yields the defaults.

use crate::types::ChannelConfig;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "TRENDPOST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "trendpost.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub generation: GenerationSettings,
    pub retry: RetrySettings,
    pub pipeline: PipelineSettings,
    pub notifications: NotificationSettings,
    pub scheduler: SchedulerSettings,
    /// Replaces the built-in category list when non-empty.
    pub categories: Vec<CategorySettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://trendpost.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared secret expected in `Authorization: Bearer <secret>`.
    pub cron_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
}

/// Model and URL overrides for one provider, e.g. `[generation.openai]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: ProviderKind,
    /// When non-empty, calls rotate across these providers.
    pub rotation: Vec<ProviderKind>,
    pub gemini: ProviderOverrides,
    pub openai: ProviderOverrides,
    pub claude: ProviderOverrides,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub timeout_secs: u64,
    /// Pause between batch items.
    pub item_delay_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            rotation: Vec::new(),
            gemini: ProviderOverrides::default(),
            openai: ProviderOverrides::default(),
            claude: ProviderOverrides::default(),
            gemini_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            temperature: 0.8,
            max_output_tokens: 2048,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 60,
            item_delay_ms: 2000,
        }
    }
}

impl GenerationSettings {
    pub fn api_key_for(&self, provider: ProviderKind) -> Option<&str> {
        let key = match provider {
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Claude => self.anthropic_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    pub fn overrides_for(&self, provider: ProviderKind) -> &ProviderOverrides {
        match provider {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Claude => &self.claude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
        }
    }
}

/// Order in which categories are checked for eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Fixed catalog order; the first due category wins.
    #[default]
    Priority,
    /// Never-posted categories first, then by how far past their interval they are.
    MostOverdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub keywords_per_post: usize,
    pub auto_publish: bool,
    pub source_name: String,
    pub scan_order: ScanOrder,
    /// Claim the category with a compare-and-set before generating.
    pub claim_before_generate: bool,
    pub log_retention_days: i64,
    pub stale_draft_days: i64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            keywords_per_post: 3,
            auto_publish: true,
            source_name: "AI Trends Bot".to_string(),
            scan_order: ScanOrder::Priority,
            claim_before_generate: false,
            log_retention_days: 30,
            stale_draft_days: 90,
            thumbnail_width: 1200,
            thumbnail_height: 630,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub rate_limit_per_hour: u32,
    pub max_retries: u32,
    pub channels: Vec<ChannelConfig>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_hour: 100,
            max_retries: 3,
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub tick_secs: u64,
    /// Offset applied to UTC when evaluating daily and weekly schedules.
    pub utc_offset_hours: i32,
    pub task_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 60,
            utc_offset_hours: 9,
            task_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySettings {
    pub name: String,
    pub slug: String,
    pub posting_interval_days: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AppConfig {
    /// Loads from `TRENDPOST_CONFIG` (or `trendpost.toml`) and applies process env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::InvalidFormat {
                details: format!("{}: {}", path.display(), e),
            }),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overrides secrets and endpoints from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = get("CRON_SECRET") {
            self.auth.cron_secret = Some(secret);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.generation.gemini_api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.generation.openai_api_key = Some(key);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.generation.anthropic_api_key = Some(key);
        }
        if let Some(addr) = get("TRENDPOST_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(webhook_url) = get("SLACK_WEBHOOK_URL") {
            self.add_channel_if_absent(ChannelConfig {
                kind: crate::ChannelKind::Slack,
                config: crate::ChannelSettings {
                    webhook_url: Some(webhook_url),
                    ..Default::default()
                },
                enabled: true,
            });
        }
        if let (Some(bot_token), Some(chat_id)) = (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            self.add_channel_if_absent(ChannelConfig {
                kind: crate::ChannelKind::Telegram,
                config: crate::ChannelSettings {
                    bot_token: Some(bot_token),
                    chat_id: Some(chat_id),
                    ..Default::default()
                },
                enabled: true,
            });
        }
    }

    fn add_channel_if_absent(&mut self, channel: ChannelConfig) {
        let exists = self
            .notifications
            .channels
            .iter()
            .any(|c| c.kind == channel.kind);
        if !exists {
            self.notifications.channels.push(channel);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.pipeline.keywords_per_post == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.keywords_per_post".to_string(),
                value: "0".to_string(),
            });
        }
        if self.pipeline.thumbnail_width == 0 || self.pipeline.thumbnail_height == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "thumbnail dimensions must be non-zero".to_string(),
            });
        }

        let gen = &self.generation;
        if !gen.temperature.is_finite() || gen.temperature < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.temperature".to_string(),
                value: gen.temperature.to_string(),
            });
        }
        if !gen.top_p.is_finite() || !(0.0..=1.0).contains(&gen.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "generation.top_p".to_string(),
                value: gen.top_p.to_string(),
            });
        }
        if gen.max_output_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.max_output_tokens".to_string(),
                value: "0".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.tick_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if !(-12..=14).contains(&self.scheduler.utc_offset_hours) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.utc_offset_hours".to_string(),
                value: self.scheduler.utc_offset_hours.to_string(),
            });
        }

        for category in &self.categories {
            if category.posting_interval_days == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("categories.{}.posting_interval_days", category.name),
                    value: "0".to_string(),
                });
            }
        }

        Ok(())
    }
}
