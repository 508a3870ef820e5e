// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Chat state manager
//!
//! Owns the session list, the process-wide current-session pointer, message
//! chronology, and the bounded-count pruning policy.
//!
//! The current-session pointer has three distinct fallback policies, one per
//! call site: pruning promotes the most recently updated survivor, deletion
//! falls back to the last element of the remaining array, and loading an
//! unknown current id falls back to index 0. They are kept separate on
//! purpose; unifying them would change observable behavior.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::ContextItem;
use crate::error::Result;
use crate::persist::PersistenceHook;
use crate::session::message::{ChatMessage, Role};

/// Tuning for the session store
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions retained before the oldest (by `updated_at`) are evicted
    pub max_sessions: usize,
    /// Advisory cap on the message window sent to a provider; the manager
    /// itself never trims stored history
    pub max_history_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            max_history_size: 100,
        }
    }
}

/// One conversation: messages, attached context, and the assigned model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub context_items: Vec<ContextItem>,
    /// Model assigned to this session; `None` falls back to the registry
    /// default at send time
    pub current_model_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation; the pruning sort key
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    fn new(model_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            context_items: Vec::new(),
            current_model_id: model_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Serializable snapshot of the session store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatState {
    pub sessions: Vec<ChatSession>,
    pub current_session_id: Option<Uuid>,
}

/// Session store with a single current-session pointer
///
/// Multiple independent instances are constructible for isolated testing;
/// there is no ambient state.
#[derive(Default)]
pub struct ChatStateManager {
    sessions: Vec<ChatSession>,
    current_session_id: Option<Uuid>,
    config: SessionConfig,
    hook: Option<Arc<dyn PersistenceHook>>,
}

impl ChatStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Install the host persistence hook
    pub fn set_persistence_hook(&mut self, hook: Arc<dyn PersistenceHook>) {
        self.hook = Some(hook);
    }

    /// Hand the current state to the persistence hook, if one is installed
    pub async fn persist(&self) -> Result<()> {
        if let Some(hook) = &self.hook {
            hook.persist(serde_json::to_value(self.export_state())?)
                .await?;
        }
        Ok(())
    }

    /// Advisory message-window cap for provider calls
    pub fn max_history_size(&self) -> usize {
        self.config.max_history_size
    }

    /// Create a session, make it current, and prune if over capacity
    pub fn create_session(&mut self, model_id: Option<Uuid>) -> ChatSession {
        let session = ChatSession::new(model_id);
        let id = session.id;
        self.sessions.push(session.clone());
        self.current_session_id = Some(id);
        self.prune();
        session
    }

    /// The session the pointer designates, if any
    pub fn current_session(&self) -> Option<&ChatSession> {
        let id = self.current_session_id?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn current_session_id(&self) -> Option<Uuid> {
        self.current_session_id
    }

    /// Point at an existing session; `false` if the id is unknown
    pub fn set_current_session(&mut self, id: Uuid) -> bool {
        if self.sessions.iter().any(|s| s.id == id) {
            self.current_session_id = Some(id);
            true
        } else {
            false
        }
    }

    pub fn get_session(&self, id: Uuid) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// All sessions, in store order
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Append a message with a fresh id and timestamp
    ///
    /// Returns `None` when the session is unknown. Bumps `updated_at`.
    pub fn add_message(
        &mut self,
        session_id: Uuid,
        role: Role,
        content: impl Into<String>,
        model_id: Option<Uuid>,
    ) -> Option<ChatMessage> {
        let session = self.sessions.iter_mut().find(|s| s.id == session_id)?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            model_id,
        };
        session.messages.push(message.clone());
        session.updated_at = Utc::now();
        Some(message)
    }

    /// Chronological copy of a session's messages
    ///
    /// Always a new vector, sorted ascending by timestamp with a stable
    /// sort so equal timestamps keep insertion order. Callers must not
    /// assume identity with stored state.
    pub fn get_messages(&self, session_id: Uuid) -> Vec<ChatMessage> {
        let Some(session) = self.get_session(session_id) else {
            return Vec::new();
        };
        let mut messages = session.messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    /// Remove all messages from a session; `false` if the id is unknown
    pub fn clear_messages(&mut self, session_id: Uuid) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.messages.clear();
                session.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Assign a model to a session; `false` if the id is unknown
    pub fn set_session_model(&mut self, session_id: Uuid, model_id: Option<Uuid>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.current_model_id = model_id;
                session.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Attach a context item to a session; `false` if the id is unknown
    pub fn add_context_item(&mut self, session_id: Uuid, item: ContextItem) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.context_items.push(item);
                session.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Detach a context item; `false` if session or item is unknown
    pub fn remove_context_item(&mut self, session_id: Uuid, item_id: Uuid) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return false;
        };
        let before = session.context_items.len();
        session.context_items.retain(|item| item.id != item_id);
        if session.context_items.len() == before {
            return false;
        }
        session.updated_at = Utc::now();
        true
    }

    /// Delete a session; `false` if the id is unknown
    ///
    /// When the deleted session was current, the pointer falls back to the
    /// last element of the remaining array.
    pub fn delete_session(&mut self, id: Uuid) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        if self.current_session_id == Some(id) {
            self.current_session_id = self.sessions.last().map(|s| s.id);
        }
        true
    }

    /// Replace state wholesale
    ///
    /// A `current_session_id` that matches no loaded session falls back to
    /// the first element of the array.
    pub fn load_state(&mut self, state: ChatState) {
        self.sessions = state.sessions;
        self.current_session_id = match state.current_session_id {
            Some(id) if self.sessions.iter().any(|s| s.id == id) => Some(id),
            _ => self.sessions.first().map(|s| s.id),
        };
    }

    /// Snapshot the full session state
    pub fn export_state(&self) -> ChatState {
        ChatState {
            sessions: self.sessions.clone(),
            current_session_id: self.current_session_id,
        }
    }

    /// Evict the oldest sessions when over capacity
    ///
    /// Sorts by `updated_at` descending and keeps the first
    /// `max_sessions`. When the current session was evicted, the pointer
    /// moves to the most recently updated survivor.
    fn prune(&mut self) {
        if self.sessions.len() <= self.config.max_sessions {
            return;
        }
        self.sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let dropped = self.sessions.len() - self.config.max_sessions;
        self.sessions.truncate(self.config.max_sessions);
        debug!(dropped, "pruned sessions over capacity");

        let current_survives = self
            .current_session_id
            .is_some_and(|id| self.sessions.iter().any(|s| s.id == id));
        if !current_survives {
            self.current_session_id = self.sessions.first().map(|s| s.id);
        }
    }
}
