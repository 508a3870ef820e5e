// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Provider and model configuration records
//!
//! These are the typed configuration objects the registry manages. Identity
//! is a generator-assigned [`Uuid`], immutable after creation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire dialect of a configured provider
///
/// A closed set: adding a dialect is a compiler-checked exhaustive-match
/// exercise everywhere the kind is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-style chat completions API
    OpenAi,
    /// Anthropic-style messages API
    Anthropic,
    /// OpenAI-compatible endpoint with a custom base URL
    Custom,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Custom => write!(f, "custom"),
        }
    }
}

/// A configured AI backend: endpoint, credentials, and wire dialect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Registry-assigned identity
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// API endpoint base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token for the `Authorization` header
    pub api_key: String,
    /// Disabled providers keep their models but hide them from the
    /// available-models view
    pub enabled: bool,
    /// Wire dialect
    pub kind: ProviderKind,
}

/// A named, provider-scoped model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Registry-assigned identity
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// The provider this model belongs to; must exist at add/update time
    pub provider_id: Uuid,
    /// Identifier sent in the request body (e.g. `gpt-4o-mini`)
    pub model_identifier: String,
    /// At most one model across the registry carries this flag
    pub is_default: bool,
}

/// Input for [`Registry::add_provider`](crate::registry::Registry::add_provider)
#[derive(Debug, Clone)]
pub struct ProviderDraft {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub kind: ProviderKind,
}

impl ProviderDraft {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        kind: ProviderKind,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            kind,
        }
    }
}

/// Partial update for a provider; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: Option<bool>,
    pub kind: Option<ProviderKind>,
}

/// Input for [`Registry::add_model`](crate::registry::Registry::add_model)
#[derive(Debug, Clone)]
pub struct ModelDraft {
    pub name: String,
    pub provider_id: Uuid,
    pub model_identifier: String,
}

impl ModelDraft {
    pub fn new(
        name: impl Into<String>,
        provider_id: Uuid,
        model_identifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_id,
            model_identifier: model_identifier.into(),
        }
    }
}

/// Partial update for a model; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ModelPatch {
    pub name: Option<String>,
    pub provider_id: Option<Uuid>,
    pub model_identifier: Option<String>,
}
