use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Client identifier sent with every request.
pub const USER_AGENT: &str = concat!("rivulet/", env!("CARGO_PKG_VERSION"));

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from a single feed retrieval.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("http error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the fetch timeout
    #[error("request timed out")]
    Timeout,
    /// Caller cancelled the request
    #[error("fetch cancelled")]
    Cancelled,
    /// Response body exceeded the size limit
    #[error("response too large")]
    ResponseTooLarge,
}

/// Build the HTTP client shared across scheduler ticks.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
}

/// Retrieve one feed document as raw bytes.
///
/// A single GET, bounded by [`FETCH_TIMEOUT`] and [`MAX_FEED_SIZE`], that
/// aborts promptly when `cancel` fires. Deliberately no retries here: the
/// scheduler's next tick is the retry policy.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, FetchError> {
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        result = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send()) => {
            result
                .map_err(|_| FetchError::Timeout)?
                .map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout
                    } else {
                        FetchError::Network(e)
                    }
                })?
        }
    };

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    // Fast path: reject oversized bodies before reading them
    if let Some(len) = response.content_length() {
        if len as usize > MAX_FEED_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let bytes = tokio::select! {
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        result = response.bytes() => result.map_err(FetchError::Network)?,
    };

    if bytes.len() > MAX_FEED_SIZE {
        return Err(FetchError::ResponseTooLarge);
    }

    Ok(bytes.to_vec())
}
