// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Context collection and formatting
//!
//! Everything that turns host documents and editor selections into the
//! text block prepended to a provider request.

mod assembly;
mod selection;
mod source;

pub use assembly::{format_items, ContextAssembly, ContextItem, ContextKind};
pub use selection::{
    LiveSelection, LiveSelectionTracker, SelectionCallback, DEFAULT_PREVIEW_LENGTH,
};
pub use source::{DocumentSource, EntryKind, FolderEntry};
