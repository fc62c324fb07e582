//! Trigger authentication: shared cron secret or an admin session.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use trendpost_core::{AuthError, Clock, CoreError, SessionStore};

/// Credentials presented with a trigger request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Value of `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            session_token: None,
        }
    }

    pub fn session(token: impl Into<String>) -> Self {
        Self {
            bearer: None,
            session_token: Some(token.into()),
        }
    }

    /// Parses an `Authorization` header value.
    pub fn from_authorization(header: Option<&str>) -> Option<String> {
        header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

/// Who a run is acting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    CronSecret,
    Admin { user_id: String },
    Scheduler,
}

pub struct Authenticator {
    cron_secret: Option<String>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(
        cron_secret: Option<String>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cron_secret: cron_secret.filter(|s| !s.is_empty()),
            sessions,
            clock,
        }
    }

    fn check_secret(&self, presented: &str) -> Result<Principal, AuthError> {
        let expected = self
            .cron_secret
            .as_deref()
            .ok_or(AuthError::SecretNotConfigured)?;
        if constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
            Ok(Principal::CronSecret)
        } else {
            Err(AuthError::InvalidSecret)
        }
    }

    /// Endpoints that only cron callers may reach.
    pub fn authorize_cron(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let presented = credentials
            .bearer
            .as_deref()
            .ok_or(AuthError::MissingCredential)?;
        self.check_secret(presented)
    }

    /// Cron secret or an unexpired admin session.
    pub async fn authorize(&self, credentials: &Credentials) -> Result<Principal, CoreError> {
        let secret_error = match credentials.bearer.as_deref() {
            Some(presented) => match self.check_secret(presented) {
                Ok(principal) => return Ok(principal),
                Err(e) => Some(e),
            },
            None => None,
        };

        let Some(token) = credentials.session_token.as_deref() else {
            return Err(secret_error.unwrap_or(AuthError::MissingCredential).into());
        };

        let session = self
            .sessions
            .lookup_session(token, self.clock.now())
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if !session.is_admin() {
            warn!("Session for {} lacks admin role", session.user_id);
            return Err(AuthError::InsufficientRole { role: session.role }.into());
        }

        debug!("Authorized admin session for {}", session.user_id);
        Ok(Principal::Admin {
            user_id: session.user_id,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use trendpost_core::{PersistError, SessionRecord, SystemClock};

    struct Sessions;

    #[async_trait]
    impl SessionStore for Sessions {
        async fn lookup_session(
            &self,
            token: &str,
            _now: DateTime<Utc>,
        ) -> Result<Option<SessionRecord>, PersistError> {
            let role = match token {
                "admin-token" => "admin",
                "user-token" => "user",
                _ => return Ok(None),
            };
            Ok(Some(SessionRecord {
                token: token.to_string(),
                user_id: format!("{role}-1"),
                role: role.to_string(),
                expires_at: None,
            }))
        }
    }

    fn authenticator(secret: Option<&str>) -> Authenticator {
        Authenticator::new(
            secret.map(str::to_string),
            Arc::new(Sessions),
            Arc::new(SystemClock),
        )
    }

    fn auth_error(result: Result<Principal, CoreError>) -> AuthError {
        match result {
            Err(CoreError::Auth(e)) => e,
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_secret_and_sessions() {
        let auth = authenticator(Some("s3cret"));

        assert_eq!(
            auth.authorize(&Credentials::bearer("s3cret")).await.unwrap(),
            Principal::CronSecret
        );
        assert_eq!(
            auth.authorize(&Credentials::session("admin-token")).await.unwrap(),
            Principal::Admin {
                user_id: "admin-1".to_string()
            }
        );

        let err = auth_error(auth.authorize(&Credentials::session("user-token")).await);
        assert_eq!(err.status_code(), 403);

        let err = auth_error(auth.authorize(&Credentials::bearer("wrong")).await);
        assert_eq!(err, AuthError::InvalidSecret);
        assert_eq!(err.status_code(), 401);

        let err = auth_error(auth.authorize(&Credentials::default()).await);
        assert_eq!(err, AuthError::MissingCredential);

        let err = auth_error(auth.authorize(&Credentials::session("stale")).await);
        assert_eq!(err, AuthError::InvalidSession);
    }

    #[tokio::test]
    async fn test_wrong_secret_falls_through_to_session() {
        let auth = authenticator(Some("s3cret"));
        let credentials = Credentials {
            bearer: Some("wrong".to_string()),
            session_token: Some("admin-token".to_string()),
        };
        assert!(matches!(
            auth.authorize(&credentials).await.unwrap(),
            Principal::Admin { .. }
        ));
    }

    #[test]
    fn test_cron_only() {
        let auth = authenticator(Some("s3cret"));
        assert_eq!(
            auth.authorize_cron(&Credentials::bearer("s3cret")).unwrap(),
            Principal::CronSecret
        );
        assert_eq!(
            auth.authorize_cron(&Credentials::session("admin-token")),
            Err(AuthError::MissingCredential)
        );
        assert_eq!(
            authenticator(None).authorize_cron(&Credentials::bearer("anything")),
            Err(AuthError::SecretNotConfigured)
        );
    }

    #[test]
    fn test_authorization_header_parsing() {
        assert_eq!(
            Credentials::from_authorization(Some("Bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(Credentials::from_authorization(Some("Basic abc")), None);
        assert_eq!(Credentials::from_authorization(Some("Bearer ")), None);
        assert_eq!(Credentials::from_authorization(None), None);
    }
}
