use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use trendpost_core::{truncate_chars, CoreError, GenerationError};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_ERROR_BODY_CHARS: usize = 500;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, CoreError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(CoreError::Network)
}

/// Sends `request` and decodes a JSON body, mapping failures onto `GenerationError`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, CoreError> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            error!("{} request timed out", provider);
            return Err(GenerationError::RequestTimeout {
                provider: provider.to_string(),
            }
            .into());
        }
        Err(e) if e.is_connect() => {
            error!("{} is unreachable: {}", provider, e);
            return Err(GenerationError::ServiceUnavailable {
                provider: provider.to_string(),
            }
            .into());
        }
        Err(e) => {
            error!("Network error calling {}: {}", provider, e);
            return Err(CoreError::Network(e));
        }
    };

    let status = response.status();
    if !status.is_success() {
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("{} rate limited, retry after {} seconds", provider, retry_after);
            return Err(GenerationError::RateLimitExceeded {
                provider: provider.to_string(),
                retry_after,
            }
            .into());
        }

        let body = response.text().await.unwrap_or_default();
        error!("{} returned HTTP {}", provider, status.as_u16());
        return Err(GenerationError::UpstreamStatus {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
        }
        .into());
    }

    debug!("{} responded with {}", provider, status);
    response.json::<T>().await.map_err(|e| {
        GenerationError::InvalidResponseFormat {
            provider: provider.to_string(),
            details: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn empty_response(provider: &str, what: &str) -> CoreError {
    GenerationError::InvalidResponseFormat {
        provider: provider.to_string(),
        details: format!("response has no {}", what),
    }
    .into()
}

pub(crate) fn missing_key(provider: &str) -> CoreError {
    GenerationError::MissingApiKey {
        provider: provider.to_string(),
    }
    .into()
}
