use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No credential supplied")]
    MissingCredential,

    #[error("Shared secret rejected")]
    InvalidSecret,

    #[error("Shared secret is not configured on the server")]
    SecretNotConfigured,

    #[error("Session is unknown or expired")]
    InvalidSession,

    #[error("Admin role required, session has role '{role}'")]
    InsufficientRole { role: String },
}

impl AuthError {
    /// HTTP status the trigger endpoints answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InsufficientRole { .. } => 403,
            _ => 401,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("API key invalid or missing for {provider}")]
    MissingApiKey { provider: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    UpstreamStatus {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Invalid response format from {provider}: {details}")]
    InvalidResponseFormat { provider: String, details: String },

    #[error("No generation provider is configured")]
    NoProviderConfigured,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJsonObject,

    #[error("Model output is not valid JSON: {details}")]
    InvalidJson { details: String },

    #[error("Required field missing or empty: {field}")]
    MissingField { field: String },

    #[error("Model output has no usable sections")]
    EmptySections,
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Slug already taken after disambiguation: {slug}")]
    SlugConflict { slug: String },

    #[error("Stored value could not be decoded: {details}")]
    CorruptRow { details: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug, Clone)]
pub enum NotificationError {
    #[error("Notification template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    #[error("Channel {channel} is not configured: {reason}")]
    ChannelNotConfigured { channel: String, reason: String },

    #[error("No sender registered for channel {channel}")]
    UnsupportedChannel { channel: String },

    #[error("{channel} returned HTTP {status}: {body}")]
    UpstreamStatus {
        channel: String,
        status: u16,
        body: String,
    },

    #[error("Delivery to {channel} failed: {details}")]
    Transport { channel: String, details: String },

    #[error("Hourly notification limit of {limit} reached")]
    RateLimited { limit: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
