// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Host document-store contract
//!
//! Context assembly needs exactly two capabilities from the host: read a
//! file's text by path, and list a folder's children. Nothing else about
//! the host's storage model leaks into the core.

use async_trait::async_trait;

use crate::error::Result;

/// Kind of a folder child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// One child of a listed folder
#[derive(Debug, Clone)]
pub struct FolderEntry {
    /// Name relative to the listed folder
    pub name: String,
    pub kind: EntryKind,
}

impl FolderEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
        }
    }
}

/// Read access to the host's document store
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Raw text content of the file at `path`
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Direct children of the folder at `path`
    async fn list_folder(&self, path: &str) -> Result<Vec<FolderEntry>>;
}
