//! Per-user registry of active sessions.
//!
//! The registry is rooted at `<root>/sessions/active`. Each child directory
//! is one session and its name is the session id; the directory listing is
//! the only index. Several server processes write here concurrently without
//! a shared lock, so every operation works from a fresh listing and relies on
//! validation to skip records that are missing pieces or half-created.

use crate::project::{DefaultProjectResolver, ProjectResolver};
use crate::session::ActiveSession;
use crate::session_paths;
use crate::storage::{PropertyStore, PropertyStoreFactory};
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of id candidates tried before `create` gives up.
const MAX_ID_ATTEMPTS: usize = 100;

/// Errors from registry operations that provision storage.
#[derive(Debug)]
pub enum RegistryError {
    /// A registry or session directory could not be created.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Every generated id collided with an existing session.
    IdExhausted { attempts: usize },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to create {}: {}", path.display(), source)
            }
            Self::IdExhausted { attempts } => {
                write!(f, "no unused session id after {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::IdExhausted { .. } => None,
        }
    }
}

/// Active sessions for one user.
pub struct ActiveSessions {
    storage_path: PathBuf,
    factory: Arc<dyn PropertyStoreFactory>,
    resolver: Arc<dyn ProjectResolver>,
}

impl ActiveSessions {
    /// Opens the registry under `root_storage_path`, creating its directory
    /// if needed. A creation failure is logged; listings are then empty.
    pub fn new(factory: Arc<dyn PropertyStoreFactory>, root_storage_path: &Path) -> Self {
        let storage_path = session_paths::storage_path(root_storage_path);
        if let Err(e) = fs::create_dir_all(&storage_path) {
            tracing::error!(
                "Failed to create session registry {}: {}",
                storage_path.display(),
                e
            );
        }

        Self {
            storage_path,
            factory,
            resolver: Arc::new(DefaultProjectResolver),
        }
    }

    /// Replaces the project resolver used by validation.
    pub fn with_resolver(mut self, resolver: Arc<dyn ProjectResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Registry root: `<root>/sessions/active`
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Allocates a new session and writes its initial properties.
    ///
    /// The id directory is claimed with a non-recursive create, so two
    /// processes can never be handed the same id. `last_used` is written last:
    /// until then a concurrent listing sees an invalid record and skips it.
    pub fn create(
        &self,
        project: &str,
        working_dir: &str,
        initial: bool,
    ) -> Result<ActiveSession, RegistryError> {
        fs::create_dir_all(&self.storage_path).map_err(|source| RegistryError::Io {
            path: self.storage_path.clone(),
            source,
        })?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_id();
            let scratch_path = session_paths::scratch_path(&self.storage_path, &id);

            match fs::create_dir(&scratch_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("Session id {} already taken, retrying", id);
                    continue;
                }
                Err(source) => {
                    return Err(RegistryError::Io {
                        path: scratch_path,
                        source,
                    })
                }
            }

            let storage = self
                .factory
                .store_for(&session_paths::properties_path(&scratch_path));
            let session = ActiveSession::provision(storage, id, scratch_path);
            session.set_project(project);
            session.set_working_dir(working_dir);
            session.set_initial(initial);
            session.set_running(false);
            session.set_last_used();

            tracing::info!(session = %session.id(), project, "Created session");
            return Ok(session);
        }

        Err(RegistryError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Returns all valid sessions, most relevant first.
    pub fn list(&self, user_home: &Path, project_sharing_enabled: bool) -> Vec<ActiveSession> {
        let mut sessions: Vec<ActiveSession> = self
            .sessions()
            .filter(|session| {
                session.validate_with(self.resolver.as_ref(), user_home, project_sharing_enabled)
            })
            .collect();

        for session in &mut sessions {
            session.refresh_sort_conditions();
        }
        sessions.sort_by(|a, b| b.rank_cmp(a));
        sessions
    }

    /// Number of sessions `list` would return, without ranking them.
    pub fn count(&self, user_home: &Path, project_sharing_enabled: bool) -> usize {
        self.sessions()
            .filter(|session| {
                session.validate_with(self.resolver.as_ref(), user_home, project_sharing_enabled)
            })
            .count()
    }

    /// Looks up a session by id, returning the empty sentinel if its
    /// directory does not exist.
    pub fn get(&self, id: &str) -> ActiveSession {
        let scratch_path = session_paths::scratch_path(&self.storage_path, id);
        let storage = self
            .factory
            .store_for(&session_paths::properties_path(&scratch_path));

        if is_valid_id(id) && scratch_path.is_dir() {
            ActiveSession::new(storage, id, scratch_path)
        } else {
            Self::empty_session(storage, id)
        }
    }

    /// Sentinel session reporting which id was requested.
    pub fn empty_session(storage: Arc<dyn PropertyStore>, id: &str) -> ActiveSession {
        ActiveSession::new_empty(storage, id)
    }

    /// Sessions for every candidate directory in the registry root.
    fn sessions(&self) -> impl Iterator<Item = ActiveSession> + '_ {
        let entries = match fs::read_dir(&self.storage_path) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(
                    "Failed to list session registry {}: {}",
                    self.storage_path.display(),
                    e
                );
                None
            }
        };

        entries
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable registry entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| {
                let id = entry.file_name().into_string().ok()?;
                is_valid_id(&id).then(|| (id, entry.path()))
            })
            .map(|(id, scratch_path)| {
                let storage = self
                    .factory
                    .store_for(&session_paths::properties_path(&scratch_path));
                ActiveSession::new(storage, id, scratch_path)
            })
    }
}

/// Generates a candidate session id: 8 lowercase hex characters.
fn generate_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !session_paths::is_hidden_entry(id) && !id.contains(['/', '\\'])
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
