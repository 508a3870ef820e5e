// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Provider request formatting
//!
//! Builds the dialect-specific JSON body for a chat completion call. The
//! mapping from provider kind to dialect is a total function over the
//! closed [`ProviderKind`] set, so adding a dialect is an exhaustive-match
//! exercise rather than a string comparison chain.

use serde::Serialize;

use crate::registry::ProviderKind;
use crate::session::ChatMessage;

/// Provider-specific request/response JSON shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// OpenAI-style chat completions
    OpenAi,
    /// Anthropic-style messages with a top-level system string
    Anthropic,
}

/// Which dialect a provider kind speaks
///
/// `Custom` endpoints are OpenAI-compatible by definition.
pub fn dialect_for(kind: ProviderKind) -> Dialect {
    match kind {
        ProviderKind::OpenAi | ProviderKind::Custom => Dialect::OpenAi,
        ProviderKind::Anthropic => Dialect::Anthropic,
    }
}

/// One `{role, content}` pair as sent on the wire
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Flatten session messages into wire messages, prepending the assembled
/// context block as one synthetic system message when non-empty
pub(crate) fn wire_messages(messages: &[ChatMessage], context_block: &str) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if !context_block.is_empty() {
        wire.push(WireMessage::new("system", context_block));
    }
    wire.extend(
        messages
            .iter()
            .map(|m| WireMessage::new(&m.role.to_string(), m.content.clone())),
    );
    wire
}

/// OpenAI-dialect request body
#[derive(Debug, Serialize)]
pub(crate) struct OpenAiRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

/// Anthropic-dialect request body
///
/// System-role messages are pulled out into the top-level `system` string;
/// the remaining roles fold to `assistant`/`user`.
#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

/// A dialect request body, serializable as-is
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum RequestBody {
    OpenAi(OpenAiRequest),
    Anthropic(AnthropicRequest),
}

/// Build the request body for a provider kind
pub(crate) fn build_body(
    kind: ProviderKind,
    model_identifier: &str,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
) -> RequestBody {
    match dialect_for(kind) {
        Dialect::OpenAi => RequestBody::OpenAi(OpenAiRequest {
            model: model_identifier.to_string(),
            messages,
            stream,
            temperature,
            max_tokens,
        }),
        Dialect::Anthropic => {
            let mut system_parts = Vec::new();
            let mut rest = Vec::new();
            for message in messages {
                if message.role == "system" {
                    system_parts.push(message.content);
                } else {
                    let role = if message.role == "assistant" {
                        "assistant"
                    } else {
                        "user"
                    };
                    rest.push(WireMessage::new(role, message.content));
                }
            }
            RequestBody::Anthropic(AnthropicRequest {
                model: model_identifier.to_string(),
                messages: rest,
                max_tokens,
                stream,
                system: if system_parts.is_empty() {
                    None
                } else {
                    Some(system_parts.join("\n"))
                },
            })
        }
    }
}
