// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Error types for Parlor
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for Parlor operations
#[derive(Error, Debug)]
pub enum ParlorError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Record validation failures, one message per failed field
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Context assembly errors
    #[error("Context error: {0}")]
    Context(String),

    /// Registry errors
    #[error("Registry error: {0}")]
    Registry(String),

    /// Persistence hook errors
    #[error("Persistence error: {0}")]
    Persist(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API failure taxonomy for provider calls
///
/// The variant decides the retry policy: [`ApiError::is_retryable`] is the
/// single source of truth consulted by the dispatcher.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (HTTP 401/403) - never retried
    #[error("Authentication failed (HTTP {status}): check the provider API key")]
    Auth { status: u16 },

    /// Rate limited (HTTP 429) - never retried automatically
    #[error("Rate limited by the provider")]
    RateLimited { retry_after: Option<u64> },

    /// Transport-level failure - retried
    #[error("Network error: {0}")]
    Network(String),

    /// Provider-side failure (5xx) - retried
    #[error("Provider error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Deadline exceeded, in-flight call was aborted - retried
    #[error("Request timed out")]
    Timeout,

    /// Unclassified status or unparsable success body - not retried
    #[error("Unexpected provider response: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Whether the dispatcher may retry after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Server { .. } | ApiError::Timeout
        )
    }

    /// The HTTP status that produced this error, when one exists
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status } => Some(*status),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Suggested wait in seconds, from a `retry-after` header
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Parlor operations
pub type Result<T> = std::result::Result<T, ParlorError>;
