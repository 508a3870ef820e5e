// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Retryable HTTP dispatch
//!
//! Every provider call is a POST to `{base_url}/chat/completions` with
//! bearer auth under a hard deadline. Failures are classified into the
//! [`ApiError`] taxonomy; whether a failure is retried depends on its
//! category, not merely the status code magnitude. The backoff delays are
//! a fixed table indexed by attempt number - the observable retry timing
//! is part of the contract, so it must not be replaced with a formula.

use std::time::Duration;

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::request::RequestBody;
use crate::error::{ApiError, Result};
use crate::registry::Provider;

/// Attempts per call, including the first
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry N+1, indexed by the attempt that just failed
pub const RETRY_DELAYS_MS: [u64; 3] = [1000, 2000, 4000];

/// Hard deadline for a non-streaming call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard deadline for a streaming call, covering the whole body
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// The chat-completions endpoint for a provider
pub(crate) fn endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Numeric `retry-after` header value, if present
///
/// The HTTP-date form of the header is ignored.
pub(crate) fn extract_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Classify a non-success HTTP response
pub(crate) fn classify_status(status: u16, retry_after: Option<u64>, body: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::Auth { status },
        429 => ApiError::RateLimited { retry_after },
        500..=599 => ApiError::Server {
            status,
            message: error_message(body),
        },
        _ => ApiError::Unknown(format!("HTTP {status}: {}", error_message(body))),
    }
}

/// Classify a transport-level failure
pub(crate) fn classify_transport(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Prefer the provider's own `error.message` field over the raw body
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    body.to_string()
}

/// POST the body and return the response text, retrying per policy
///
/// Each attempt covers the send and the body read, so a deadline hit
/// while reading is retried the same as one while connecting.
pub(crate) async fn request_text(
    http: &reqwest::Client,
    provider: &Provider,
    body: &RequestBody,
    timeout: Duration,
) -> Result<String> {
    let url = endpoint(&provider.base_url);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let error = match send(http, &url, provider, body, timeout).await {
            Ok(response) => match response.text().await {
                Ok(text) => return Ok(text),
                Err(err) => classify_transport(&err),
            },
            Err(error) => error,
        };

        if !should_retry(&error, attempt) {
            return Err(error.into());
        }
        backoff(attempt, &error).await;
    }
}

/// POST the body and hand back the streaming response, retrying per policy
///
/// Retries cover establishing the call only; once the stream is open,
/// errors are terminal.
pub(crate) async fn request_stream(
    http: &reqwest::Client,
    provider: &Provider,
    body: &RequestBody,
    timeout: Duration,
) -> Result<reqwest::Response> {
    let url = endpoint(&provider.base_url);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match send(http, &url, provider, body, timeout).await {
            Ok(response) => return Ok(response),
            Err(error) => {
                if !should_retry(&error, attempt) {
                    return Err(error.into());
                }
                backoff(attempt, &error).await;
            }
        }
    }
}

/// One attempt: send the request and classify any failure
async fn send(
    http: &reqwest::Client,
    url: &str,
    provider: &Provider,
    body: &RequestBody,
    timeout: Duration,
) -> std::result::Result<reqwest::Response, ApiError> {
    let result = http
        .post(url)
        .timeout(timeout)
        .header(AUTHORIZATION, format!("Bearer {}", provider.api_key))
        .header(CONTENT_TYPE, "application/json")
        .json(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => Ok(response),
        Ok(response) => {
            let status = response.status().as_u16();
            let retry_after = extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, retry_after, &body))
        }
        Err(err) => Err(classify_transport(&err)),
    }
}

fn should_retry(error: &ApiError, attempt: u32) -> bool {
    if !error.is_retryable() {
        debug!(%error, "terminal provider error, not retrying");
        return false;
    }
    if attempt >= MAX_ATTEMPTS {
        warn!(%error, attempts = attempt, "retry budget exhausted");
        return false;
    }
    true
}

async fn backoff(attempt: u32, error: &ApiError) {
    let delay_ms = RETRY_DELAYS_MS[(attempt - 1) as usize % RETRY_DELAYS_MS.len()];
    warn!(attempt, delay_ms, %error, "provider call failed, retrying");
    sleep(Duration::from_millis(delay_ms)).await;
}
