//! Story session engine for Fabula.
//!
//! Drives a narrative runtime on behalf of many concurrent users, one live
//! session per user: bounded stepping under a wall-clock budget, runaway
//! script detection with de-duplicated owner diagnostics, and persistence
//! of interpreter state across restarts.
//!
//! The engine consumes its collaborators through traits ([`ContentStore`],
//! [`SessionStore`], [`IssueStore`], [`NotificationSink`], and the runtime
//! seam from `fabula_runtime`); in-memory implementations for tests and the
//! CLI live in [`memory`].

mod config;
mod error;
mod issues;
mod manager;
pub mod memory;
mod stepper;
mod stores;

pub use config::EngineConfig;
pub use error::{SessionError, SessionErrorKind, SessionResult};
pub use issues::{IssueClass, IssueDetector, LoopVerdict, Notice};
pub use manager::{ProbeReport, SessionManager};
pub use stepper::step;
pub use stores::{
    ContentStore, IssueStore, NotificationSink, SavedState, SessionRecord, SessionStore,
};
