// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Send-message orchestration
//!
//! Ties the registry, session store, context assembly, and provider client
//! together into the one flow the host calls: record the user's message,
//! dispatch the provider call, record the reply.
//!
//! `send` takes `&mut self`, so a second in-flight send through the same
//! engine cannot be expressed; per-session single-flight needs no runtime
//! lock.

use tracing::debug;
use uuid::Uuid;

use crate::client::AiClient;
use crate::context::{ContextAssembly, ContextItem, DocumentSource, LiveSelectionTracker};
use crate::error::{ParlorError, Result};
use crate::registry::{Model, Provider, Registry};
use crate::session::{ChatMessage, ChatStateManager, Role};

/// Orchestrates one conversation turn at a time
#[derive(Default)]
pub struct ChatEngine {
    registry: Registry,
    sessions: ChatStateManager,
    context: ContextAssembly,
    live_selection: LiveSelectionTracker,
    client: AiClient,
}

impl ChatEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble an engine from preconfigured parts
    pub fn from_parts(
        registry: Registry,
        sessions: ChatStateManager,
        client: AiClient,
    ) -> Self {
        Self {
            registry,
            sessions,
            context: ContextAssembly::new(),
            live_selection: LiveSelectionTracker::new(),
            client,
        }
    }

    // ----- accessors -----

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn sessions(&self) -> &ChatStateManager {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut ChatStateManager {
        &mut self.sessions
    }

    pub fn context(&self) -> &ContextAssembly {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextAssembly {
        &mut self.context
    }

    pub fn live_selection(&self) -> &LiveSelectionTracker {
        &self.live_selection
    }

    pub fn live_selection_mut(&mut self) -> &mut LiveSelectionTracker {
        &mut self.live_selection
    }

    // ----- context conveniences -----

    /// Attach a file to the working context and mirror it onto the active
    /// session for persistence
    pub async fn add_file_context(
        &mut self,
        source: &dyn DocumentSource,
        path: &str,
    ) -> Result<ContextItem> {
        let item = self.context.add_file(source, path).await?;
        self.mirror_context_item(&item);
        Ok(item)
    }

    /// Attach a folder to the working context and mirror it onto the
    /// active session
    pub async fn add_folder_context(
        &mut self,
        source: &dyn DocumentSource,
        path: &str,
    ) -> Result<ContextItem> {
        let item = self.context.add_folder(source, path).await?;
        self.mirror_context_item(&item);
        Ok(item)
    }

    /// Attach a text selection to the working context and mirror it onto
    /// the active session
    pub fn add_selection_context(
        &mut self,
        text: &str,
        source_path: Option<&str>,
    ) -> Result<ContextItem> {
        let item = self.context.add_selection(text, source_path)?;
        self.mirror_context_item(&item);
        Ok(item)
    }

    /// Remove a context item from the working set and the active session
    pub fn remove_context(&mut self, item_id: Uuid) -> bool {
        let removed = self.context.remove(item_id);
        if let Some(session_id) = self.sessions.current_session_id() {
            self.sessions.remove_context_item(session_id, item_id);
        }
        removed
    }

    fn mirror_context_item(&mut self, item: &ContextItem) {
        if let Some(session_id) = self.sessions.current_session_id() {
            self.sessions.add_context_item(session_id, item.clone());
        }
    }

    // ----- model selection -----

    /// Assign a registry model to the active session
    pub fn set_active_model(&mut self, model_id: Uuid) -> Result<()> {
        if self.registry.get_model(model_id).is_none() {
            return Err(ParlorError::Registry(format!("unknown model: {model_id}")));
        }
        let session_id = self.ensure_session();
        self.sessions.set_session_model(session_id, Some(model_id));
        Ok(())
    }

    // ----- sending -----

    /// Send a message and wait for the whole reply
    pub async fn send_message(&mut self, text: &str) -> Result<ChatMessage> {
        self.send_inner(text, None).await
    }

    /// Send a message, delivering the reply incrementally
    ///
    /// The callback fires once per text chunk in stream order; the
    /// accumulated reply is still recorded and returned at the end.
    pub async fn send_message_streaming<F>(
        &mut self,
        text: &str,
        mut on_chunk: F,
    ) -> Result<ChatMessage>
    where
        F: FnMut(&str),
    {
        self.send_inner(text, Some(&mut on_chunk)).await
    }

    async fn send_inner(
        &mut self,
        text: &str,
        on_chunk: Option<&mut dyn FnMut(&str)>,
    ) -> Result<ChatMessage> {
        let (provider, model, session_id) = self.resolve_target()?;

        // The user's message is recorded before the provider call begins
        // and stays recorded if the call fails; partial conversation state
        // is intentional.
        self.sessions
            .add_message(session_id, Role::User, text, None)
            .ok_or_else(|| ParlorError::Session("active session disappeared".to_string()))?;
        self.sessions.persist().await?;

        let context_block = self.assemble_context();
        let history = self.history_window(session_id);
        debug!(
            session = %session_id,
            model = %model.model_identifier,
            history_len = history.len(),
            "dispatching send"
        );

        let reply = match on_chunk {
            Some(callback) => {
                self.client
                    .stream_with(&provider, &model, &history, &context_block, |chunk| {
                        callback(chunk)
                    })
                    .await?
            }
            None => {
                self.client
                    .complete(&provider, &model, &history, &context_block)
                    .await?
            }
        };

        let message = self
            .sessions
            .add_message(session_id, Role::Assistant, reply, Some(model.id))
            .ok_or_else(|| ParlorError::Session("active session disappeared".to_string()))?;
        self.sessions.persist().await?;
        Ok(message)
    }

    /// Current session id, creating a session when none exists
    fn ensure_session(&mut self) -> Uuid {
        match self.sessions.current_session_id() {
            Some(id) => id,
            None => {
                let default_model = self.registry.default_model().map(|m| m.id);
                self.sessions.create_session(default_model).id
            }
        }
    }

    /// Resolve the active session, its model, and the model's enabled
    /// provider
    fn resolve_target(&mut self) -> Result<(Provider, Model, Uuid)> {
        let session_id = self.ensure_session();

        let session_model = self
            .sessions
            .get_session(session_id)
            .and_then(|s| s.current_model_id);
        let model_id = session_model
            .or_else(|| self.registry.default_model().map(|m| m.id))
            .ok_or_else(|| ParlorError::Registry("no model configured".to_string()))?;
        let model = self
            .registry
            .get_model(model_id)
            .ok_or_else(|| ParlorError::Registry(format!("unknown model: {model_id}")))?
            .clone();
        let provider = self
            .registry
            .get_provider(model.provider_id)
            .ok_or_else(|| {
                ParlorError::Registry(format!("model '{}' has no provider", model.name))
            })?
            .clone();
        if !provider.enabled {
            return Err(ParlorError::Registry(format!(
                "provider '{}' is disabled",
                provider.name
            )));
        }
        Ok((provider, model, session_id))
    }

    /// Merge assembled context and the live selection into one block
    ///
    /// The live selection is synthesized fresh per request and never
    /// persisted.
    fn assemble_context(&self) -> String {
        let base = self.context.format_for_api();
        let live = self.live_selection.format_for_api();
        match (base.is_empty(), live.is_empty()) {
            (true, true) => String::new(),
            (false, true) => base,
            (true, false) => live,
            (false, false) => format!("{base}\n\n{live}"),
        }
    }

    /// Chronological history capped to the advisory window
    ///
    /// Stored history is never trimmed; only the window sent to the
    /// provider is.
    fn history_window(&self, session_id: Uuid) -> Vec<ChatMessage> {
        let mut messages = self.sessions.get_messages(session_id);
        let excess = messages.len().saturating_sub(self.sessions.max_history_size());
        if excess > 0 {
            messages.drain(..excess);
        }
        messages
    }
}
