// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Chat message types
//!
//! Messages are an append-only log: once created they are never mutated,
//! and their ordering key is the timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt or synthetic context preamble
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A message in a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the sender
    pub role: Role,

    /// Message text
    pub content: String,

    /// Ordering key; ties keep insertion order
    pub timestamp: DateTime<Utc>,

    /// Model that produced an assistant reply, recorded as a historical id
    /// rather than a live registry reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<Uuid>,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>, model_id: Option<Uuid>) -> Self {
        Self::new(Role::Assistant, content, model_id)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None)
    }

    fn new(role: Role, content: impl Into<String>, model_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            model_id,
        }
    }
}
