//! Error recovery strategies for the content pipeline.
//!
//! Each error in the taxonomy maps to a strategy: transient upstream failures
//! are retried with backoff, unreadable model output falls back to the
//! placeholder document, item-level persistence and notification failures are
//! skipped, and credential or configuration problems fail the run.

use crate::config::RetrySettings;
use crate::{CoreError, ErrorExt, PersistError};
use std::time::Duration;
use tracing::info;

/// Recovery strategy for handling errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation with exponential backoff
    RetryWithBackoff {
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    },
    /// Substitute a fallback value supplied by the caller
    Fallback,
    /// Skip the item and continue with the rest of the run
    Skip,
    /// Continue with reduced functionality
    Degrade,
    /// Fail immediately
    Fail,
}

/// Result of an error recovery attempt
#[derive(Debug)]
pub enum RecoveryResult<T> {
    /// Recovery was successful, operation can continue
    Recovered(T),
    /// The operation failed but a substitute value is available
    Degraded(T),
    /// Recovery failed, operation should be skipped
    Skipped,
    /// Recovery failed, error should be propagated
    Failed(CoreError),
}

impl<T> RecoveryResult<T> {
    /// Returns true if the operation was successfully recovered
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryResult::Recovered(_))
    }

    /// Returns true if the operation can continue with degraded functionality
    pub fn is_degraded(&self) -> bool {
        matches!(self, RecoveryResult::Degraded(_))
    }

    /// Returns true if the operation should be skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, RecoveryResult::Skipped)
    }

    /// Returns true if the operation failed and error should be propagated
    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryResult::Failed(_))
    }

    /// Replaces a failure with a substitute value built from the error.
    pub fn or_fallback<F>(self, fallback: F) -> RecoveryResult<T>
    where
        F: FnOnce(&CoreError) -> T,
    {
        match self {
            RecoveryResult::Failed(error) => {
                info!("Substituting fallback after: {}", error);
                RecoveryResult::Degraded(fallback(&error))
            }
            other => other,
        }
    }

    /// Transforms a recovered or degraded value, keeping the variant.
    pub fn map<U, F>(self, f: F) -> RecoveryResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            RecoveryResult::Recovered(value) => RecoveryResult::Recovered(f(value)),
            RecoveryResult::Degraded(value) => RecoveryResult::Degraded(f(value)),
            RecoveryResult::Skipped => RecoveryResult::Skipped,
            RecoveryResult::Failed(error) => RecoveryResult::Failed(error),
        }
    }

    /// Converts back into a `Result`; a skipped operation becomes an internal error.
    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            RecoveryResult::Recovered(value) | RecoveryResult::Degraded(value) => Ok(value),
            RecoveryResult::Skipped => Err(CoreError::Internal {
                message: "operation skipped".to_string(),
            }),
            RecoveryResult::Failed(error) => Err(error),
        }
    }

    /// Returns the error if failed, None otherwise
    pub fn err(self) -> Option<CoreError> {
        match self {
            RecoveryResult::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Error recovery handler that provides strategies for different error types
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        match error {
            // Missing credentials cannot be fixed by retrying
            CoreError::Generation(e) if !e.is_retryable() => RecoveryStrategy::Fail,

            // Transient upstream failures - retry with backoff
            CoreError::Generation(_) | CoreError::Network(_) => {
                RecoveryStrategy::RetryWithBackoff {
                    max_attempts: 3,
                    initial_delay: Duration::from_secs(2),
                    max_delay: Duration::from_secs(30),
                }
            }

            // Unreadable model output - placeholder document
            CoreError::Parse(_) => RecoveryStrategy::Fallback,

            CoreError::Persist(db_error) => match db_error {
                PersistError::DatabaseLocked => RecoveryStrategy::RetryWithBackoff {
                    max_attempts: 5,
                    initial_delay: Duration::from_millis(100),
                    max_delay: Duration::from_secs(5),
                },
                PersistError::ConnectionFailed { .. } | PersistError::MigrationFailed(_) => {
                    RecoveryStrategy::Fail
                }
                _ => RecoveryStrategy::Skip,
            },

            // One channel failing never blocks the others
            CoreError::Notification(_) => RecoveryStrategy::Skip,

            // Auth and configuration errors need operator intervention
            CoreError::Auth(_) | CoreError::Config(_) => RecoveryStrategy::Fail,

            // Timeout errors - retry once with longer timeout
            CoreError::Timeout { .. } => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 2,
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(10),
            },

            CoreError::InvalidInput { .. } | CoreError::NotFound { .. } => RecoveryStrategy::Skip,

            CoreError::Internal { .. } => RecoveryStrategy::Degrade,

            CoreError::Io(_) | CoreError::Serialization(_) => RecoveryStrategy::Fail,
        }
    }

    /// Retry strategy built from configured settings.
    pub fn retry_from_settings(settings: &RetrySettings) -> RecoveryStrategy {
        RecoveryStrategy::RetryWithBackoff {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// Apply the recovery strategy to an operation
    pub async fn apply_strategy<F, T, Fut>(
        strategy: RecoveryStrategy,
        mut operation: F,
    ) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>> + Send,
        T: Send,
    {
        match strategy {
            RecoveryStrategy::RetryWithBackoff {
                max_attempts,
                initial_delay,
                max_delay,
            } => Self::retry_with_backoff(operation, max_attempts, initial_delay, max_delay).await,
            RecoveryStrategy::Skip => RecoveryResult::Skipped,
            // The caller owns the substitute value; see `RecoveryResult::or_fallback`
            RecoveryStrategy::Fallback | RecoveryStrategy::Degrade | RecoveryStrategy::Fail => {
                match operation().await {
                    Ok(value) => RecoveryResult::Recovered(value),
                    Err(error) => RecoveryResult::Failed(error),
                }
            }
        }
    }

    /// Retry an operation with exponential backoff
    async fn retry_with_backoff<F, T, Fut>(
        mut operation: F,
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        let mut delay = initial_delay;

        loop {
            match operation().await {
                Ok(result) => return RecoveryResult::Recovered(result),
                Err(error) => {
                    attempt += 1;

                    // If we've exhausted all attempts or the error is not retryable, fail
                    if attempt >= max_attempts || !error.is_retryable() {
                        return RecoveryResult::Failed(error);
                    }

                    // A rate limit tells us exactly how long to wait
                    if let Some(retry_delay) = error.retry_after() {
                        delay = delay.max(retry_delay);
                    }

                    if delay > max_delay {
                        delay = max_delay;
                    }

                    let wait = with_jitter(delay, 0.1);
                    info!(
                        "Recovery attempt {}/{} failed. Retrying after {:?}: {}",
                        attempt,
                        max_attempts,
                        wait,
                        error.user_friendly_message()
                    );

                    tokio::time::sleep(wait).await;

                    // Exponential backoff (double the delay, capped at max_delay)
                    delay = std::cmp::min(delay * 2, max_delay);
                }
            }
        }
    }
}

/// Spreads `delay` by up to `jitter_factor` in either direction.
pub fn with_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    let spread = delay.as_secs_f64() * jitter_factor.min(1.0);
    let offset = (fastrand::f64() * 2.0 - 1.0) * spread;
    Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
}
