// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Incremental SSE frame parsing
//!
//! Streaming responses arrive as newline-delimited `data: <json>` frames
//! terminated by a literal `data: [DONE]`. Bytes arrive at arbitrary
//! boundaries, so the decoder buffers text, emits only complete lines, and
//! holds the last (possibly partial) line back for the next read. A final
//! frame that arrived without its trailing newline is recovered by
//! [`SseLineDecoder::finish`] once the upstream closes.

/// Streaming line decoder with hold-back and end-of-stream flush
#[derive(Debug, Default)]
pub(crate) struct SseLineDecoder {
    buffer: String,
    done: bool,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume a chunk of bytes and return the complete frame payloads it
    /// unlocked, in arrival order
    ///
    /// Blank lines and lines without the `data: ` prefix are skipped. On
    /// `[DONE]` the decoder stops immediately and ignores all further
    /// input.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while !self.done {
            let Some(newline) = self.buffer.find('\n') else {
                break;
            };
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload == "[DONE]" {
                self.done = true;
                self.buffer.clear();
                break;
            }
            payloads.push(payload.to_string());
        }
        payloads
    }

    /// Flush a trailing complete frame that never got its newline
    ///
    /// Called once after the upstream closes; anything that does not look
    /// like a full `data: ` frame is dropped.
    pub fn finish(&mut self) -> Option<String> {
        if self.done {
            self.buffer.clear();
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = rest.trim_end_matches('\r');
        let payload = line.strip_prefix("data: ")?;
        if payload == "[DONE]" {
            return None;
        }
        Some(payload.to_string())
    }
}

/// Pull the text delta out of a parsed frame
///
/// Probes the OpenAI shape (`choices[0].delta.content`) first, then the
/// Anthropic shape (`delta.text`). Malformed JSON yields `None`; partial
/// frames are tolerated, not fatal.
pub(crate) fn extract_delta(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    if let Some(text) = value["choices"][0]["delta"]["content"].as_str() {
        return Some(text.to_string());
    }
    value["delta"]["text"].as_str().map(str::to_string)
}
