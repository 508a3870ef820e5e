// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Host persistence contract
//!
//! The core imposes no storage engine. State owners serialize themselves to
//! a JSON value and hand it to a host-supplied hook after a mutation batch;
//! the only requirement on the host is that the same shape round-trips.

use async_trait::async_trait;

use crate::error::Result;

/// Opaque save callback supplied by the host
#[async_trait]
pub trait PersistenceHook: Send + Sync {
    /// Durably store the given blob, replacing any previous one for the
    /// same owner
    async fn persist(&self, blob: serde_json::Value) -> Result<()>;
}
