//! Durable registry of active workbench sessions.
//!
//! Each user's sessions live under `<root>/sessions/active/<id>/`, one
//! directory per session with one file per property. Any number of server
//! processes may read and write the registry at once; there is no shared lock,
//! so readers validate what they find and skip incomplete records.
//!
//! - [`ActiveSessions`]: create, list, count and look up sessions
//! - [`ActiveSession`]: typed property access, validation and ranking
//! - [`GlobalActiveSessions`]: server-wide records of session processes
//! - [`SessionCountWatcher`]: callback when the valid session count changes

pub mod config;
pub mod global;
pub mod project;
pub mod registry;
pub mod session;
pub mod session_paths;
pub mod settings;
pub mod storage;
pub mod watcher;

pub use config::RegistryConfig;
pub use global::{GlobalActiveSession, GlobalActiveSessions};
pub use project::{DefaultProjectResolver, ProjectResolver};
pub use registry::{ActiveSessions, RegistryError};
pub use session::{ActiveSession, SortConditions};
pub use storage::{
    LegacyPropertyStore, LegacyStoreFactory, PropertyStore, PropertyStoreFactory, StorageError,
};
pub use watcher::{track_active_session_count, CountTracker, SessionCountWatcher};
