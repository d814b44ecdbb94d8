use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use super::LookupError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Shared client for both lookup tiers.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()
}

/// Sends `request` and returns the body of a successful response.
///
/// One deadline covers the whole exchange. Bodies over `limit` bytes are
/// rejected, by `Content-Length` when the server sends one and otherwise
/// while reading.
pub(crate) async fn fetch_body(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    limit: usize,
) -> Result<String, LookupError> {
    let deadline = Instant::now() + timeout;
    let mut response = timeout_at(deadline, request.send())
        .await
        .map_err(|_| LookupError::Timeout)??;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::HttpStatus(status.as_u16()));
    }
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(LookupError::ResponseTooLarge(limit));
    }

    let mut body = Vec::new();
    while let Some(chunk) = timeout_at(deadline, response.chunk())
        .await
        .map_err(|_| LookupError::Timeout)??
    {
        if body.len() + chunk.len() > limit {
            return Err(LookupError::ResponseTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body).map_err(|_| LookupError::InvalidUtf8)
}
