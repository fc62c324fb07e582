use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Auth(e) => {
                error!("Auth error details: {:?}", e);
            }
            CoreError::Generation(e) => {
                error!("Generation error details: {:?}", e);
            }
            CoreError::Parse(e) => {
                error!("Parse error details: {:?}", e);
            }
            CoreError::Persist(e) => {
                error!("Persistence error details: {:?}", e);
            }
            CoreError::Notification(e) => {
                error!("Notification error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Generation(e) => e.is_retryable(),
            CoreError::Persist(e) => e.is_retryable(),
            CoreError::Notification(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Generation(e) => e.retry_after(),
            CoreError::Persist(e) => e.retry_after(),
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)), // Default retry delay
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Auth(e) => e.user_friendly_message(),
            CoreError::Generation(e) => e.user_friendly_message(),
            CoreError::Parse(e) => e.user_friendly_message(),
            CoreError::Persist(e) => e.user_friendly_message(),
            CoreError::Notification(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check connectivity to upstream services."
                    .to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Timeout { .. } => {
                "The operation took too long to complete. Please try again.".to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Auth(_) => "AUTH".to_string(),
            CoreError::Generation(_) => "GENERATION".to_string(),
            CoreError::Parse(_) => "PARSE".to_string(),
            CoreError::Persist(_) => "PERSIST".to_string(),
            CoreError::Notification(_) => "NOTIFICATION".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for AuthError {
    fn log_error(&self) -> &Self {
        error!("AuthError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AuthError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AuthError::MissingCredential => "Authentication required.".to_string(),
            AuthError::InvalidSecret | AuthError::InvalidSession => {
                "Credential rejected. Please sign in again.".to_string()
            }
            AuthError::SecretNotConfigured => {
                "Automation trigger is not configured on this server.".to_string()
            }
            AuthError::InsufficientRole { .. } => "Admin access required.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            AuthError::MissingCredential => "AUTH_MISSING_CREDENTIAL".to_string(),
            AuthError::InvalidSecret => "AUTH_INVALID_SECRET".to_string(),
            AuthError::SecretNotConfigured => "AUTH_SECRET_NOT_CONFIGURED".to_string(),
            AuthError::InvalidSession => "AUTH_INVALID_SESSION".to_string(),
            AuthError::InsufficientRole { .. } => "AUTH_FORBIDDEN".to_string(),
        }
    }
}

impl ErrorExt for GenerationError {
    fn log_error(&self) -> &Self {
        error!("GenerationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("GenerationError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimitExceeded { .. }
            | GenerationError::RequestTimeout { .. }
            | GenerationError::ServiceUnavailable { .. } => true,
            GenerationError::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(10)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            GenerationError::MissingApiKey { provider } => format!(
                "API key for {} is missing. Please update your credentials.",
                provider
            ),
            GenerationError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "Rate limit exceeded for {}. Please wait {} seconds.",
                provider, retry_after
            ),
            GenerationError::ServiceUnavailable { provider } => format!(
                "{} service is temporarily unavailable. Please try again later.",
                provider
            ),
            GenerationError::NoProviderConfigured => {
                "No AI provider is configured. Set an API key first.".to_string()
            }
            _ => "AI service error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            GenerationError::MissingApiKey { .. } => "GEN_MISSING_API_KEY".to_string(),
            GenerationError::UpstreamStatus { .. } => "GEN_UPSTREAM_STATUS".to_string(),
            GenerationError::RateLimitExceeded { .. } => "GEN_RATE_LIMIT".to_string(),
            GenerationError::RequestTimeout { .. } => "GEN_TIMEOUT".to_string(),
            GenerationError::ServiceUnavailable { .. } => "GEN_SERVICE_UNAVAILABLE".to_string(),
            GenerationError::InvalidResponseFormat { .. } => "GEN_INVALID_RESPONSE".to_string(),
            GenerationError::NoProviderConfigured => "GEN_NO_PROVIDER".to_string(),
        }
    }
}

impl ErrorExt for ParseError {
    fn log_error(&self) -> &Self {
        error!("ParseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ParseError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // The fallback document replaces unparseable output
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        "The AI response could not be read; a placeholder article was used instead.".to_string()
    }

    fn error_code(&self) -> String {
        match self {
            ParseError::NoJsonObject => "PARSE_NO_JSON".to_string(),
            ParseError::InvalidJson { .. } => "PARSE_INVALID_JSON".to_string(),
            ParseError::MissingField { .. } => "PARSE_MISSING_FIELD".to_string(),
            ParseError::EmptySections => "PARSE_EMPTY_SECTIONS".to_string(),
        }
    }
}

impl ErrorExt for PersistError {
    fn log_error(&self) -> &Self {
        error!("PersistError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("PersistError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            PersistError::DatabaseLocked | PersistError::ConnectionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            PersistError::DatabaseLocked => Some(Duration::from_millis(100)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            PersistError::ConnectionFailed { .. } => {
                "Database connection failed. Please try again.".to_string()
            }
            PersistError::DatabaseLocked => {
                "Database is temporarily busy. Please try again.".to_string()
            }
            PersistError::SlugConflict { slug } => {
                format!("An article with the address '{}' already exists.", slug)
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            PersistError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            PersistError::MigrationFailed(_) => "DB_MIGRATION_FAILED".to_string(),
            PersistError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            PersistError::SlugConflict { .. } => "DB_SLUG_CONFLICT".to_string(),
            PersistError::CorruptRow { .. } => "DB_CORRUPT_ROW".to_string(),
            PersistError::DatabaseLocked => "DB_LOCKED".to_string(),
            PersistError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for NotificationError {
    fn log_error(&self) -> &Self {
        error!("NotificationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("NotificationError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Transport { .. } => true,
            NotificationError::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(5))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            NotificationError::ChannelNotConfigured { channel, .. } => {
                format!("Notification channel '{}' is not configured.", channel)
            }
            NotificationError::RateLimited { .. } => {
                "Too many notifications this hour; message dropped.".to_string()
            }
            _ => "Notification could not be delivered.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            NotificationError::TemplateNotFound { .. } => "NOTIFY_TEMPLATE_NOT_FOUND".to_string(),
            NotificationError::ChannelNotConfigured { .. } => {
                "NOTIFY_CHANNEL_NOT_CONFIGURED".to_string()
            }
            NotificationError::UnsupportedChannel { .. } => "NOTIFY_UNSUPPORTED_CHANNEL".to_string(),
            NotificationError::UpstreamStatus { .. } => "NOTIFY_UPSTREAM_STATUS".to_string(),
            NotificationError::Transport { .. } => "NOTIFY_TRANSPORT".to_string(),
            NotificationError::RateLimited { .. } => "NOTIFY_RATE_LIMITED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors are typically not retryable
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => {
                "Configuration file not found. Please check the installation.".to_string()
            }
            ConfigError::InvalidFormat { .. } | ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is inconsistent: {}", reason)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                if let Some(retry_after) = error.retry_after() {
                    info!("Error is retryable. Retry after: {:?}", retry_after);
                }
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
