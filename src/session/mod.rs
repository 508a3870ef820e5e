// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Parlor Contributors

//! Chat sessions and the state manager that owns them

mod manager;
mod message;

pub use manager::{ChatSession, ChatState, ChatStateManager, SessionConfig};
pub use message::{ChatMessage, Role};
