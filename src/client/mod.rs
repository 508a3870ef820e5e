// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! AI provider client: request formatting, retryable dispatch, and
//! streaming response parsing

#[allow(clippy::module_inception)]
mod client;
mod dispatch;
mod request;
mod sse;

pub use client::{AiClient, ChunkStream, ClientConfig};
pub use dispatch::{MAX_ATTEMPTS, REQUEST_TIMEOUT, RETRY_DELAYS_MS, STREAM_TIMEOUT};
pub use request::{dialect_for, Dialect};
