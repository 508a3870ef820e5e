// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! AI provider client
//!
//! Turns a provider, model, message history, and context block into a
//! completed assistant reply or an ordered stream of text deltas.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::client::dispatch::{
    classify_transport, request_stream, request_text, REQUEST_TIMEOUT, STREAM_TIMEOUT,
};
use crate::client::request::{build_body, wire_messages};
use crate::client::sse::{extract_delta, SseLineDecoder};
use crate::error::{ApiError, ParlorError, Result};
use crate::registry::{Model, Provider};
use crate::session::ChatMessage;

/// Ordered stream of assistant text deltas
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client tuning; the defaults match the provider contract
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hard deadline for a non-streaming call
    pub request_timeout: std::time::Duration,
    /// Hard deadline for a streaming call, covering the whole body
    pub stream_timeout: std::time::Duration,
    /// Sampling temperature sent on OpenAI-dialect requests
    pub temperature: f32,
    /// Output token cap sent on every request
    pub max_tokens: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            stream_timeout: STREAM_TIMEOUT,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// HTTP client for all configured providers
///
/// Stateless apart from the connection pool; one instance serves every
/// provider and session.
#[derive(Default)]
pub struct AiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl AiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Whole-body completion
    ///
    /// Accepts either dialect's response shape regardless of the provider
    /// kind; anything else is an [`ApiError::Unknown`].
    pub async fn complete(
        &self,
        provider: &Provider,
        model: &Model,
        messages: &[ChatMessage],
        context_block: &str,
    ) -> Result<String> {
        let wire = wire_messages(messages, context_block);
        let body = build_body(
            provider.kind,
            &model.model_identifier,
            wire,
            false,
            self.config.temperature,
            self.config.max_tokens,
        );
        debug!(provider = %provider.name, model = %model.model_identifier, "sending completion request");

        let text = request_text(&self.http, provider, &body, self.config.request_timeout).await?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|_| ApiError::Unknown("response body is not JSON".to_string()))?;
        parse_completion(&value)
    }

    /// Streaming completion as a push-style stream of text chunks
    ///
    /// Chunks are yielded synchronously in strict arrival order, exactly
    /// once each; the stream ends at `[DONE]`, upstream close (after
    /// flushing a trailing unterminated frame), or a terminal error.
    pub async fn complete_stream(
        &self,
        provider: &Provider,
        model: &Model,
        messages: &[ChatMessage],
        context_block: &str,
    ) -> Result<ChunkStream> {
        let wire = wire_messages(messages, context_block);
        let body = build_body(
            provider.kind,
            &model.model_identifier,
            wire,
            true,
            self.config.temperature,
            self.config.max_tokens,
        );
        debug!(provider = %provider.name, model = %model.model_identifier, "opening completion stream");

        let response =
            request_stream(&self.http, provider, &body, self.config.stream_timeout).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseLineDecoder::new();
            while let Some(item) = bytes.next().await {
                let chunk = item.map_err(|e| ParlorError::Api(classify_transport(&e)))?;
                for payload in decoder.feed(&chunk) {
                    if let Some(text) = extract_delta(&payload) {
                        yield text;
                    }
                }
                if decoder.is_done() {
                    break;
                }
            }
            if let Some(payload) = decoder.finish() {
                if let Some(text) = extract_delta(&payload) {
                    yield text;
                }
            }
        };
        Ok(Box::pin(stream))
    }

    /// Streaming completion delivered through a chunk callback
    ///
    /// The callback fires once per chunk in stream order; the accumulated
    /// full text is returned after the stream completes.
    pub async fn stream_with<F>(
        &self,
        provider: &Provider,
        model: &Model,
        messages: &[ChatMessage],
        context_block: &str,
        mut on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut stream = self
            .complete_stream(provider, model, messages, context_block)
            .await?;

        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            full.push_str(&chunk);
        }
        Ok(full)
    }
}

/// Extract the reply text from a non-streaming response body
///
/// OpenAI shape first (`choices[0].message.content`), then Anthropic
/// (`content[0].text`).
fn parse_completion(value: &serde_json::Value) -> Result<String> {
    if let Some(text) = value["choices"][0]["message"]["content"].as_str() {
        return Ok(text.to_string());
    }
    if let Some(text) = value["content"][0]["text"].as_str() {
        return Ok(text.to_string());
    }
    Err(ApiError::Unknown("unrecognized response shape".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_shape() {
        let value = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(parse_completion(&value).unwrap(), "hello");
    }

    #[test]
    fn test_parse_anthropic_shape() {
        let value = serde_json::json!({
            "content": [{"type": "text", "text": "hi there"}]
        });
        assert_eq!(parse_completion(&value).unwrap(), "hi there");
    }

    #[test]
    fn test_parse_unknown_shape_errors() {
        let value = serde_json::json!({"result": "nope"});
        let err = parse_completion(&value).unwrap_err();
        assert!(matches!(
            err,
            ParlorError::Api(ApiError::Unknown(_))
        ));
    }

    #[test]
    fn test_config_defaults_match_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout.as_secs(), 30);
        assert_eq!(config.stream_timeout.as_secs(), 60);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.max_tokens, 2000);
    }
}
