// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Context assembly
//!
//! Holds the context items (files, folders, free-text selections) attached
//! to a request and renders them into the single text block prepended to
//! the conversation as a synthetic system message.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::context::source::{DocumentSource, EntryKind};
use crate::error::{ParlorError, Result};

/// Kind of a context item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    File,
    Folder,
    Selection,
}

/// A unit of extra text injected into a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Uuid,
    pub kind: ContextKind,
    /// Source path for file/folder items; absent for selections without one
    pub path: Option<String>,
    pub content: String,
    pub display_name: String,
}

/// Ordered collection of context items
///
/// Items render in insertion order. The live selection is never stored
/// here; it is synthesized fresh per request by the engine.
#[derive(Debug, Default)]
pub struct ContextAssembly {
    items: Vec<ContextItem>,
}

impl ContextAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a file's content as a context item
    pub async fn add_file(
        &mut self,
        source: &dyn DocumentSource,
        path: &str,
    ) -> Result<ContextItem> {
        validate_path(path)?;
        let content = source.read_file(path).await?;
        let item = ContextItem {
            id: Uuid::new_v4(),
            kind: ContextKind::File,
            path: Some(path.to_string()),
            content,
            display_name: base_name(path).to_string(),
        };
        self.items.push(item.clone());
        Ok(item)
    }

    /// Attach a folder as a single context item containing its files
    ///
    /// Individual file reads that fail are logged and skipped; partial
    /// success is the contract for batch collection. Nested folders are
    /// listed but not descended into.
    pub async fn add_folder(
        &mut self,
        source: &dyn DocumentSource,
        path: &str,
    ) -> Result<ContextItem> {
        validate_path(path)?;
        let entries = source.list_folder(path).await?;

        let mut sections = Vec::new();
        for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
            let child_path = join_path(path, &entry.name);
            match source.read_file(&child_path).await {
                Ok(content) => sections.push(format!("File: {}\n{}", entry.name, content)),
                Err(err) => {
                    warn!(path = %child_path, %err, "skipping unreadable file in folder context");
                }
            }
        }

        let item = ContextItem {
            id: Uuid::new_v4(),
            kind: ContextKind::Folder,
            path: Some(path.to_string()),
            content: sections.join("\n\n"),
            display_name: base_name(path).to_string(),
        };
        self.items.push(item.clone());
        Ok(item)
    }

    /// Attach a free-text selection as a context item
    pub fn add_selection(
        &mut self,
        text: &str,
        source_path: Option<&str>,
    ) -> Result<ContextItem> {
        if text.trim().is_empty() {
            return Err(ParlorError::Context(
                "selection text must not be empty".to_string(),
            ));
        }
        let display_name = match source_path {
            Some(path) => format!("Selection from {}", base_name(path)),
            None => "Selection".to_string(),
        };
        let item = ContextItem {
            id: Uuid::new_v4(),
            kind: ContextKind::Selection,
            path: source_path.map(str::to_string),
            content: text.to_string(),
            display_name,
        };
        self.items.push(item.clone());
        Ok(item)
    }

    /// Remove an item by id; idempotent, `false` when absent
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Drop every item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items in insertion order
    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render all items into the request preamble block
    ///
    /// Empty context yields an empty string with no wrapper text.
    pub fn format_for_api(&self) -> String {
        format_items(&self.items)
    }
}

/// Render a slice of context items into the request preamble block
pub fn format_items(items: &[ContextItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        match item.kind {
            ContextKind::File | ContextKind::Folder => {
                let label = match item.kind {
                    ContextKind::File => "File",
                    _ => "Folder",
                };
                let path = item.path.as_deref().unwrap_or(&item.display_name);
                blocks.push(format!(
                    "--- {label}: {path} ---\n{}\n--- End of {path} ---",
                    item.content
                ));
            }
            ContextKind::Selection => {
                let quoted: Vec<String> = item
                    .content
                    .lines()
                    .map(|line| format!("> {line}"))
                    .collect();
                blocks.push(quoted.join("\n"));
            }
        }
    }

    format!(
        "The user has provided the following context:\n\n{}",
        blocks.join("\n\n")
    )
}

fn validate_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(ParlorError::Context("path must not be empty".to_string()));
    }
    if path.split(['/', '\\']).any(|component| component == "..") {
        return Err(ParlorError::Context(format!(
            "path must not traverse upward: {path}"
        )));
    }
    Ok(())
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn join_path(folder: &str, child: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), child)
}
