//! HTTP retry for transient failures.
//!
//! Connection errors, timeouts, HTTP 429 and 5xx are retried with
//! exponential backoff (1s, 2s, 4s). Other 4xx answers are permanent.

use std::time::Duration;

use crate::NowcastError;

const MAX_RETRIES: u32 = 3;

/// Sends the request built by `build_request` and parses the body as JSON.
///
/// `build_request` is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `send`.
///
/// # Errors
///
/// * [`NowcastError::Http`] if the request fails after all retries
/// * [`NowcastError::Status`] on a non-retryable or exhausted status
/// * [`NowcastError::Json`] if the body is not JSON
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, NowcastError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request).await?;
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F) -> Result<reqwest::Response, NowcastError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << (attempt - 1));
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(NowcastError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let retryable =
                    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if retryable && attempt < MAX_RETRIES {
                    log::warn!("  HTTP {status}");
                    attempt += 1;
                    continue;
                }

                return Err(NowcastError::Status {
                    status: status.as_u16(),
                    url: response.url().to_string(),
                });
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
