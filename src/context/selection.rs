// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Live selection tracker
//!
//! A single-slot holder for the host editor's current selection. The slot
//! is ephemeral: it is never persisted, and replacing it discards the
//! previous value without trace.

use chrono::{DateTime, Utc};

/// Default preview length in characters
pub const DEFAULT_PREVIEW_LENGTH: usize = 100;

/// The current editor selection, at most one at a time
#[derive(Debug, Clone)]
pub struct LiveSelection {
    pub content: String,
    pub source_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Change callback; receives the new slot value (None on clear)
pub type SelectionCallback = Box<dyn FnMut(Option<&LiveSelection>) + Send>;

/// Single-slot selection holder with change notification
///
/// The notification slot holds one synchronous callback; setting a new one
/// replaces the old rather than adding a subscriber.
#[derive(Default)]
pub struct LiveSelectionTracker {
    slot: Option<LiveSelection>,
    on_change: Option<SelectionCallback>,
}

impl LiveSelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the change callback
    pub fn set_on_change(&mut self, callback: SelectionCallback) {
        self.on_change = Some(callback);
    }

    /// Replace the slot wholesale
    ///
    /// Blank content behaves exactly like [`clear_selection`]: a no-op when
    /// the slot is already empty, a notifying clear otherwise.
    ///
    /// [`clear_selection`]: LiveSelectionTracker::clear_selection
    pub fn set_selection(&mut self, content: &str, source_path: Option<&str>) {
        if content.trim().is_empty() {
            self.clear_selection();
            return;
        }

        self.slot = Some(LiveSelection {
            content: content.to_string(),
            source_path: source_path.map(str::to_string),
            timestamp: Utc::now(),
        });
        self.notify();
    }

    /// Empty the slot; notifies only if a selection existed
    pub fn clear_selection(&mut self) {
        if self.slot.is_none() {
            return;
        }
        self.slot = None;
        self.notify();
    }

    /// The current selection, if any
    pub fn selection(&self) -> Option<&LiveSelection> {
        self.slot.as_ref()
    }

    pub fn has_selection(&self) -> bool {
        self.slot.is_some()
    }

    /// Truncated view of the content for display
    ///
    /// Returns the full content when it fits; otherwise the first
    /// `max_length - 3` characters plus `"..."`, for a total of exactly
    /// `max_length`.
    pub fn get_preview(&self, max_length: usize) -> String {
        let Some(selection) = &self.slot else {
            return String::new();
        };
        let count = selection.content.chars().count();
        if count <= max_length {
            return selection.content.clone();
        }
        let head: String = selection
            .content
            .chars()
            .take(max_length.saturating_sub(3))
            .collect();
        format!("{head}...")
    }

    /// Preview at the default length
    pub fn preview(&self) -> String {
        self.get_preview(DEFAULT_PREVIEW_LENGTH)
    }

    /// Render the selection for inclusion in a request
    pub fn format_for_api(&self) -> String {
        match &self.slot {
            None => String::new(),
            Some(selection) => {
                let origin = match &selection.source_path {
                    Some(path) => format!(" (from {path})"),
                    None => String::new(),
                };
                format!("[Live Selection{origin}]\n{}", selection.content)
            }
        }
    }

    fn notify(&mut self) {
        if let Some(callback) = &mut self.on_change {
            callback(self.slot.as_ref());
        }
    }
}
