//! Metadata view over one active session.
//!
//! An [`ActiveSession`] is a thin typed layer over a [`PropertyStore`]: every
//! getter reads through to storage and every setter writes through. Storage
//! failures are logged and degrade to the property's default, so a corrupt or
//! half-written session never breaks the caller.
//!
//! A session without a scratch path is the "empty" sentinel returned for
//! lookups that found nothing. All getters on it return defaults (with
//! [`ActiveSession::initial`] defaulting to `true`) and all setters are no-ops.

use crate::project::{DefaultProjectResolver, ProjectResolver};
use crate::session_paths::{self, PROJECT_NONE};
use crate::storage::PropertyStore;
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PROJECT: &str = "project";
const WORKING_DIR: &str = "working_directory";
const INITIAL: &str = "initial";
const LAST_USED: &str = "last_used";
const EXECUTING: &str = "executing";
const SAVE_PROMPT_REQUIRED: &str = "save_prompt_required";
const RUNNING: &str = "running";
const R_VERSION: &str = "r_version";
const R_VERSION_HOME: &str = "r_version_home";
const R_VERSION_LABEL: &str = "r_version_label";
const LABEL: &str = "label";
const LAUNCH_PARAMETERS: &str = "launch_parameters";

/// Snapshot of the properties used for ranking.
///
/// Captured by [`ActiveSession::refresh_sort_conditions`] and never updated
/// implicitly, so a batch sorted after one refresh pass has a stable order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SortConditions {
    pub executing: bool,
    pub running: bool,
    pub last_used: f64,
}

/// One user session's persisted metadata.
pub struct ActiveSession {
    id: String,
    scratch_path: Option<PathBuf>,
    properties_path: Option<PathBuf>,
    sort_conditions: SortConditions,
    storage: Arc<dyn PropertyStore>,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("scratch_path", &self.scratch_path)
            .field("sort_conditions", &self.sort_conditions)
            .finish()
    }
}

impl ActiveSession {
    /// Creates the empty sentinel for `id`.
    pub(crate) fn new_empty(storage: Arc<dyn PropertyStore>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scratch_path: None,
            properties_path: None,
            sort_conditions: SortConditions::default(),
            storage,
        }
    }

    /// Binds a session to an existing scratch directory without touching disk.
    pub(crate) fn new(
        storage: Arc<dyn PropertyStore>,
        id: impl Into<String>,
        scratch_path: PathBuf,
    ) -> Self {
        let properties_path = session_paths::properties_path(&scratch_path);
        Self {
            id: id.into(),
            scratch_path: Some(scratch_path),
            properties_path: Some(properties_path),
            sort_conditions: SortConditions::default(),
            storage,
        }
    }

    /// Binds a session and makes sure its scratch and properties directories
    /// exist. Failures are logged; the session then fails validation.
    pub(crate) fn provision(
        storage: Arc<dyn PropertyStore>,
        id: impl Into<String>,
        scratch_path: PathBuf,
    ) -> Self {
        let session = Self::new(storage, id, scratch_path);
        if let Some(properties_path) = &session.properties_path {
            if let Err(e) = fs::create_dir_all(properties_path) {
                tracing::error!(
                    session = %session.id,
                    "Failed to create session directory {}: {}",
                    properties_path.display(),
                    e
                );
            }
        }
        session
    }

    /// True for the sentinel session that has no scratch path.
    pub fn is_empty(&self) -> bool {
        self.scratch_path.is_none()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch_path.as_deref()
    }

    pub fn properties_path(&self) -> Option<&Path> {
        self.properties_path.as_deref()
    }

    pub fn project(&self) -> String {
        self.read_property(PROJECT)
    }

    pub fn set_project(&self, project: &str) {
        self.write_property(PROJECT, project);
    }

    pub fn working_dir(&self) -> String {
        self.read_property(WORKING_DIR)
    }

    pub fn set_working_dir(&self, working_dir: &str) {
        self.write_property(WORKING_DIR, working_dir);
    }

    /// Whether the session should start in the default working directory.
    ///
    /// The empty session reports `true`: without a scratch path (desktop,
    /// single-session mode) every start is an initial start.
    pub fn initial(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        self.read_bool(INITIAL)
    }

    pub fn set_initial(&self, initial: bool) {
        self.write_bool(INITIAL, initial);
    }

    /// Last-used time in epoch milliseconds, or 0 if never stamped.
    pub fn last_used(&self) -> f64 {
        parse_timestamp(&self.read_property(LAST_USED))
    }

    /// Stamps the last-used time with the current time.
    ///
    /// Successive stamps on one session are strictly increasing even when
    /// they land in the same millisecond.
    pub fn set_last_used(&self) {
        if self.is_empty() {
            return;
        }
        let now = chrono::Utc::now().timestamp_millis() as f64;
        let previous = self.last_used();
        let stamp = if now > previous { now } else { previous + 1.0 };
        self.write_property(LAST_USED, &format_timestamp(stamp));
    }

    pub fn executing(&self) -> bool {
        self.read_bool(EXECUTING)
    }

    pub fn set_executing(&self, executing: bool) {
        self.write_bool(EXECUTING, executing);
    }

    pub fn save_prompt_required(&self) -> bool {
        self.read_bool(SAVE_PROMPT_REQUIRED)
    }

    pub fn set_save_prompt_required(&self, save_prompt_required: bool) {
        self.write_bool(SAVE_PROMPT_REQUIRED, save_prompt_required);
    }

    pub fn running(&self) -> bool {
        self.read_bool(RUNNING)
    }

    pub fn set_running(&self, running: bool) {
        self.write_bool(RUNNING, running);
    }

    pub fn r_version(&self) -> String {
        self.read_property(R_VERSION)
    }

    pub fn r_version_home(&self) -> String {
        self.read_property(R_VERSION_HOME)
    }

    pub fn r_version_label(&self) -> String {
        self.read_property(R_VERSION_LABEL)
    }

    pub fn set_r_version(&self, r_version: &str, r_version_home: &str, r_version_label: &str) {
        self.write_property(R_VERSION, r_version);
        self.write_property(R_VERSION_HOME, r_version_home);
        self.write_property(R_VERSION_LABEL, r_version_label);
    }

    /// Display name of the session.
    pub fn label(&self) -> String {
        self.read_property(LABEL)
    }

    pub fn set_label(&self, label: &str) {
        self.write_property(LABEL, label);
    }

    pub fn launch_parameters(&self) -> String {
        self.read_property(LAUNCH_PARAMETERS)
    }

    pub fn set_launch_parameters(&self, launch_parameters: &str) {
        self.write_property(LAUNCH_PARAMETERS, launch_parameters);
    }

    /// Records that the session's process has started.
    pub fn begin_session(&self, r_version: &str, r_version_home: &str, r_version_label: &str) {
        self.set_last_used();
        self.set_running(true);
        self.set_r_version(r_version, r_version_home, r_version_label);
    }

    /// Records that the session's process has exited, for any reason.
    pub fn end_session(&self) {
        self.set_last_used();
        self.set_running(false);
        self.set_executing(false);
    }

    /// Total bytes under the scratch directory, 0 if it does not exist.
    pub fn suspend_size(&self) -> u64 {
        match &self.scratch_path {
            Some(path) => session_paths::size_recursive(path),
            None => 0,
        }
    }

    /// Removes the scratch directory tree. Succeeds if it is already gone.
    pub fn destroy(&self) -> std::io::Result<()> {
        let Some(path) = &self.scratch_path else {
            return Ok(());
        };
        match fs::remove_dir_all(path) {
            Ok(()) => {
                tracing::debug!(session = %self.id, "Destroyed session");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Validates with the filesystem project resolver.
    pub fn validate(&self, user_home: &Path, project_sharing_enabled: bool) -> bool {
        self.validate_with(&DefaultProjectResolver, user_home, project_sharing_enabled)
    }

    /// Returns true if the session record is complete enough to be listed.
    ///
    /// Checks run cheapest first: directories, then required properties, then
    /// project descriptor resolution.
    pub fn validate_with(
        &self,
        resolver: &dyn ProjectResolver,
        user_home: &Path,
        project_sharing_enabled: bool,
    ) -> bool {
        let (Some(scratch_path), Some(properties_path)) =
            (&self.scratch_path, &self.properties_path)
        else {
            return false;
        };
        if !scratch_path.is_dir() || !properties_path.is_dir() {
            return false;
        }

        let project = self.project();
        if project.is_empty() || self.working_dir().is_empty() || self.last_used() == 0.0 {
            return false;
        }

        if project != PROJECT_NONE {
            let project_dir = session_paths::resolve_aliased_path(&project, user_home);
            if !project_dir.exists() {
                return false;
            }

            let Some(project_file) = resolver.project_file(&project_dir) else {
                return false;
            };

            if !project_sharing_enabled && resolver.is_shared_path(&project_file, user_home) {
                return false;
            }
        }

        true
    }

    /// Re-reads the ranking snapshot from storage.
    pub fn refresh_sort_conditions(&mut self) {
        self.sort_conditions = SortConditions {
            executing: self.executing(),
            running: self.running(),
            last_used: self.last_used(),
        };
    }

    pub fn sort_conditions(&self) -> SortConditions {
        self.sort_conditions
    }

    /// Compares ranking snapshots: executing, then running, then most
    /// recently used, then id. `Greater` means `self` ranks higher.
    pub fn rank_cmp(&self, other: &ActiveSession) -> Ordering {
        let lhs = &self.sort_conditions;
        let rhs = &other.sort_conditions;
        lhs.executing
            .cmp(&rhs.executing)
            .then(lhs.running.cmp(&rhs.running))
            .then(lhs.last_used.total_cmp(&rhs.last_used))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn greater_than(&self, other: &ActiveSession) -> bool {
        self.rank_cmp(other) == Ordering::Greater
    }

    fn read_property(&self, name: &str) -> String {
        if self.is_empty() {
            return String::new();
        }
        match self.storage.read_property(name) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(session = %self.id, property = name, "Failed to read property: {}", e);
                String::new()
            }
        }
    }

    fn write_property(&self, name: &str, value: &str) {
        if self.is_empty() {
            return;
        }
        if let Err(e) = self.storage.write_property(name, value) {
            tracing::error!(session = %self.id, property = name, "Failed to write property: {}", e);
        }
    }

    fn read_bool(&self, name: &str) -> bool {
        parse_bool(&self.read_property(name)).unwrap_or(false)
    }

    fn write_bool(&self, name: &str, value: bool) {
        self.write_property(name, if value { "1" } else { "0" });
    }
}

/// Parses a stored boolean (`1`/`0`, also `true`/`false`).
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" => Some(true),
        "0" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> f64 {
    match value.parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms > 0.0 => ms,
        _ => 0.0,
    }
}

fn format_timestamp(ms: f64) -> String {
    format!("{}", ms)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
