use std::time::Duration;
use trendpost_core::{
    AuthError, ConfigError, CoreError, ErrorExt, ErrorRecovery, ErrorReporter, GenerationError,
    NotificationError, ParseError, PersistError, RecoveryStrategy,
};

#[test]
fn test_error_codes() {
    let auth_error = CoreError::Auth(AuthError::InvalidSecret);
    assert_eq!(auth_error.error_code(), "AUTH");

    let db_error = CoreError::Persist(PersistError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "PERSIST");

    let gen_error = CoreError::Generation(GenerationError::MissingApiKey {
        provider: "gemini".to_string(),
    });
    assert_eq!(gen_error.error_code(), "GENERATION");

    let parse_error = CoreError::Parse(ParseError::NoJsonObject);
    assert_eq!(parse_error.error_code(), "PARSE");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "cron_secret".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    assert_eq!(
        PersistError::SlugConflict {
            slug: "x".to_string()
        }
        .error_code(),
        "DB_SLUG_CONFLICT"
    );
}

#[test]
fn test_retryable_errors() {
    let rate_limited = CoreError::Generation(GenerationError::RateLimitExceeded {
        provider: "gemini".to_string(),
        retry_after: 60,
    });
    assert!(rate_limited.is_retryable());

    let server_error = CoreError::Generation(GenerationError::UpstreamStatus {
        provider: "gemini".to_string(),
        status: 503,
        body: "overloaded".to_string(),
    });
    assert!(server_error.is_retryable());

    let bad_request = CoreError::Generation(GenerationError::UpstreamStatus {
        provider: "gemini".to_string(),
        status: 400,
        body: "bad".to_string(),
    });
    assert!(!bad_request.is_retryable());

    let missing_key = CoreError::Generation(GenerationError::MissingApiKey {
        provider: "gemini".to_string(),
    });
    assert!(!missing_key.is_retryable());

    let transport = CoreError::Notification(NotificationError::Transport {
        channel: "slack".to_string(),
        details: "connection reset".to_string(),
    });
    assert!(transport.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::Generation(GenerationError::RateLimitExceeded {
        provider: "openai".to_string(),
        retry_after: 60,
    });
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

    let timeout_error = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));

    let auth_error = CoreError::Auth(AuthError::MissingCredential);
    assert_eq!(auth_error.retry_after(), None);
}

#[test]
fn test_auth_status_codes() {
    assert_eq!(AuthError::MissingCredential.status_code(), 401);
    assert_eq!(AuthError::InvalidSecret.status_code(), 401);
    assert_eq!(AuthError::InvalidSession.status_code(), 401);
    assert_eq!(
        AuthError::InsufficientRole {
            role: "user".to_string()
        }
        .status_code(),
        403
    );
}

#[test]
fn test_user_friendly_messages() {
    let auth_error = CoreError::Auth(AuthError::InsufficientRole {
        role: "user".to_string(),
    });
    assert_eq!(auth_error.user_friendly_message(), "Admin access required.");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "cron_secret".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("cron_secret"));
}

#[test]
fn test_recovery_strategy_by_stage() {
    let parse = CoreError::Parse(ParseError::EmptySections);
    assert_eq!(
        ErrorRecovery::determine_strategy(&parse),
        RecoveryStrategy::Fallback
    );

    let slug = CoreError::Persist(PersistError::SlugConflict {
        slug: "x".to_string(),
    });
    assert_eq!(ErrorRecovery::determine_strategy(&slug), RecoveryStrategy::Skip);

    let missing_key = CoreError::Generation(GenerationError::MissingApiKey {
        provider: "claude".to_string(),
    });
    assert_eq!(
        ErrorRecovery::determine_strategy(&missing_key),
        RecoveryStrategy::Fail
    );
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::Notification(NotificationError::RateLimited { limit: 100 });

    // Reporting must never panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
