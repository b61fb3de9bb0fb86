//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the
//! fabula binary.

mod commands;
mod play;
mod validate;

pub use commands::{Cli, Commands, ValidationOutputFormat};
pub use play::handle_play_command;
pub use validate::handle_validate_command;

use fabula_engine::memory::{
    MemoryContentStore, MemoryIssueStore, MemorySessionStore, RecordingSink,
};
use fabula_engine::{EngineConfig, SessionManager};
use fabula_runtime::ScriptedFactory;
use std::sync::Arc;

/// Builds a session manager over in-memory stores and the scripted runtime.
pub(crate) fn memory_manager(config: EngineConfig) -> (SessionManager, MemoryContentStore) {
    let content = MemoryContentStore::new();
    let manager = SessionManager::new(
        Arc::new(content.clone()),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryIssueStore::new()),
        Arc::new(RecordingSink::new()),
        Arc::new(ScriptedFactory::new()),
        config,
    );
    (manager, content)
}
