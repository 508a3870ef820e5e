// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Provider/model registry
//!
//! CRUD store for provider and model configuration. Enforces referential
//! integrity (a model must reference an existing provider), keeps the
//! default-model flag unique, and derives the available-models view on
//! every call rather than caching it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ParlorError, Result};
use crate::persist::PersistenceHook;
use crate::registry::types::{Model, ModelDraft, ModelPatch, Provider, ProviderDraft, ProviderPatch};
use crate::registry::validation::{validate_model, validate_provider};

/// Serializable snapshot of the registry, as handed to the persistence hook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryState {
    pub providers: Vec<Provider>,
    pub models: Vec<Model>,
}

/// In-memory provider/model configuration store
///
/// Single-threaded by design: no interior locking, callers own the value.
/// Multiple independent instances are constructible for isolated testing.
#[derive(Default)]
pub struct Registry {
    providers: Vec<Provider>,
    models: Vec<Model>,
    hook: Option<Arc<dyn PersistenceHook>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the host persistence hook
    pub fn set_persistence_hook(&mut self, hook: Arc<dyn PersistenceHook>) {
        self.hook = Some(hook);
    }

    /// Hand the current state to the persistence hook, if one is installed
    ///
    /// Called explicitly after a mutation batch; mutating operations never
    /// auto-save.
    pub async fn persist(&self) -> Result<()> {
        if let Some(hook) = &self.hook {
            hook.persist(serde_json::to_value(self.export_state())?)
                .await?;
        }
        Ok(())
    }

    // ----- providers -----

    /// Add a provider; fails with the accumulated field errors without
    /// mutating state
    pub fn add_provider(&mut self, draft: ProviderDraft) -> Result<Provider> {
        let report = validate_provider(&draft.name, &draft.base_url, &draft.api_key);
        if !report.is_valid() {
            return Err(ParlorError::Validation(report.errors));
        }

        let provider = Provider {
            id: Uuid::new_v4(),
            name: draft.name,
            base_url: draft.base_url,
            api_key: draft.api_key,
            enabled: true,
            kind: draft.kind,
        };
        debug!(provider = %provider.name, kind = %provider.kind, "provider added");
        self.providers.push(provider.clone());
        Ok(provider)
    }

    /// Apply a partial update; the patched record is re-validated before
    /// anything is committed
    pub fn update_provider(&mut self, id: Uuid, patch: ProviderPatch) -> Result<Provider> {
        let index = self
            .providers
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ParlorError::Registry(format!("unknown provider: {id}")))?;

        let mut updated = self.providers[index].clone();
        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(base_url) = patch.base_url {
            updated.base_url = base_url;
        }
        if let Some(api_key) = patch.api_key {
            updated.api_key = api_key;
        }
        if let Some(enabled) = patch.enabled {
            updated.enabled = enabled;
        }
        if let Some(kind) = patch.kind {
            updated.kind = kind;
        }

        let report = validate_provider(&updated.name, &updated.base_url, &updated.api_key);
        if !report.is_valid() {
            return Err(ParlorError::Validation(report.errors));
        }

        self.providers[index] = updated.clone();
        Ok(updated)
    }

    /// Delete a provider and every model referencing it
    ///
    /// Returns `false` if the id is unknown; no partial deletion states are
    /// observable.
    pub fn delete_provider(&mut self, id: Uuid) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.id != id);
        if self.providers.len() == before {
            return false;
        }
        let orphaned = self.models.iter().filter(|m| m.provider_id == id).count();
        self.models.retain(|m| m.provider_id != id);
        debug!(%id, cascaded_models = orphaned, "provider deleted");
        true
    }

    /// Flip a provider's enabled flag; returns `false` if the id is unknown
    pub fn toggle_provider(&mut self, id: Uuid) -> bool {
        match self.providers.iter_mut().find(|p| p.id == id) {
            Some(provider) => {
                provider.enabled = !provider.enabled;
                true
            }
            None => false,
        }
    }

    /// Look up a provider by id
    pub fn get_provider(&self, id: Uuid) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// All configured providers, in insertion order
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    // ----- models -----

    /// Add a model; the referenced provider must exist
    pub fn add_model(&mut self, draft: ModelDraft) -> Result<Model> {
        let report = validate_model(&draft.name, Some(draft.provider_id), &draft.model_identifier);
        if !report.is_valid() {
            return Err(ParlorError::Validation(report.errors));
        }
        if self.get_provider(draft.provider_id).is_none() {
            return Err(ParlorError::Validation(vec![
                "Model provider does not exist".to_string(),
            ]));
        }

        let model = Model {
            id: Uuid::new_v4(),
            name: draft.name,
            provider_id: draft.provider_id,
            model_identifier: draft.model_identifier,
            is_default: false,
        };
        debug!(model = %model.name, "model added");
        self.models.push(model.clone());
        Ok(model)
    }

    /// Apply a partial update; the patched record is re-validated (including
    /// the provider reference) before anything is committed
    pub fn update_model(&mut self, id: Uuid, patch: ModelPatch) -> Result<Model> {
        let index = self
            .models
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| ParlorError::Registry(format!("unknown model: {id}")))?;

        let mut updated = self.models[index].clone();
        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(provider_id) = patch.provider_id {
            updated.provider_id = provider_id;
        }
        if let Some(model_identifier) = patch.model_identifier {
            updated.model_identifier = model_identifier;
        }

        let report = validate_model(
            &updated.name,
            Some(updated.provider_id),
            &updated.model_identifier,
        );
        if !report.is_valid() {
            return Err(ParlorError::Validation(report.errors));
        }
        if self.get_provider(updated.provider_id).is_none() {
            return Err(ParlorError::Validation(vec![
                "Model provider does not exist".to_string(),
            ]));
        }

        self.models[index] = updated.clone();
        Ok(updated)
    }

    /// Delete a model; returns `false` if the id is unknown
    ///
    /// Past messages that recorded this model's id are unaffected; they keep
    /// a historical id, not a live reference.
    pub fn delete_model(&mut self, id: Uuid) -> bool {
        let before = self.models.len();
        self.models.retain(|m| m.id != id);
        self.models.len() != before
    }

    /// Mark a model as the single registry-wide default
    ///
    /// Unsets the flag on every other model before setting the target, so
    /// exactly one model carries it afterward. Returns `false` if the id is
    /// unknown, leaving state untouched.
    pub fn set_default_model(&mut self, id: Uuid) -> bool {
        if !self.models.iter().any(|m| m.id == id) {
            return false;
        }
        for model in &mut self.models {
            model.is_default = model.id == id;
        }
        true
    }

    /// The model currently flagged as default, if any
    pub fn default_model(&self) -> Option<&Model> {
        self.models.iter().find(|m| m.is_default)
    }

    /// Look up a model by id
    pub fn get_model(&self, id: Uuid) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    /// All configured models, in insertion order
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Models belonging to one provider
    pub fn models_for_provider(&self, provider_id: Uuid) -> Vec<&Model> {
        self.models
            .iter()
            .filter(|m| m.provider_id == provider_id)
            .collect()
    }

    /// Models whose provider is enabled
    ///
    /// A pure derived view, recomputed on every call.
    pub fn available_models(&self) -> Vec<Model> {
        self.models
            .iter()
            .filter(|m| {
                self.providers
                    .iter()
                    .any(|p| p.id == m.provider_id && p.enabled)
            })
            .cloned()
            .collect()
    }

    // ----- state -----

    /// Snapshot the full registry state
    pub fn export_state(&self) -> RegistryState {
        RegistryState {
            providers: self.providers.clone(),
            models: self.models.clone(),
        }
    }

    /// Replace the registry state wholesale
    pub fn load_state(&mut self, state: RegistryState) {
        self.providers = state.providers;
        self.models = state.models;
    }
}
