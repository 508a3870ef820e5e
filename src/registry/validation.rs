// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Pure validation predicates for provider and model records
//!
//! Errors accumulate rather than short-circuit so the caller can surface
//! every missing field at once.

use uuid::Uuid;

/// Outcome of validating a record
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// One message per failed check; empty means valid
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Whether every check passed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn require(&mut self, present: bool, message: &str) {
        if !present {
            self.errors.push(message.to_string());
        }
    }
}

/// Validate provider fields: `name`, `base_url`, `api_key` must be
/// non-empty after trimming
pub fn validate_provider(name: &str, base_url: &str, api_key: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.require(!name.trim().is_empty(), "Provider name is required");
    report.require(!base_url.trim().is_empty(), "Provider base URL is required");
    report.require(!api_key.trim().is_empty(), "Provider API key is required");
    report
}

/// Validate model fields: `name` and `model_identifier` must be non-empty
/// after trimming, and a provider reference must be present
///
/// Referential integrity (the provider actually existing) is the registry's
/// job; this predicate only checks presence.
pub fn validate_model(
    name: &str,
    provider_id: Option<Uuid>,
    model_identifier: &str,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.require(!name.trim().is_empty(), "Model name is required");
    report.require(provider_id.is_some(), "Model provider is required");
    report.require(
        !model_identifier.trim().is_empty(),
        "Model identifier is required",
    );
    report
}
