//! Shared HTTP plumbing for the hosted services (OpenAI, Pinecone).
//!
//! # Retry Strategy
//!
//! Retries are off unless `max_retries > 0`. When enabled:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

/// Failure of a single logical call, after retries.
#[derive(Debug)]
pub enum HttpFailure {
    /// No response was received.
    Request(String),
    /// A non-success status was received.
    Status { status: u16, body: String },
}

/// Build a client with an optional per-request timeout.
pub fn build_client(timeout_secs: Option<u64>) -> reqwest::Result<Client> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

/// Send the request produced by `make_request`, retrying transient
/// failures up to `max_retries` extra times. Returns the first successful
/// response.
pub async fn send_with_retry<F>(make_request: F, max_retries: u32) -> Result<Response, HttpFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let failure = HttpFailure::Status {
                    status: status.as_u16(),
                    body,
                };
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(failure);
                    continue;
                }
                return Err(failure);
            }
            Err(e) => {
                last_err = Some(HttpFailure::Request(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| HttpFailure::Request("request failed after retries".to_string())))
}
