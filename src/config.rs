use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the root storage path.
pub const ENV_ROOT: &str = "ACTIVE_SESSIONS_ROOT";
/// Overrides the watcher poll interval (milliseconds).
pub const ENV_POLL_MS: &str = "ACTIVE_SESSIONS_POLL_MS";
/// Enables project sharing (`1`/`true`).
pub const ENV_PROJECT_SHARING: &str = "ACTIVE_SESSIONS_PROJECT_SHARING";

/// Registry configuration.
///
/// Every field has a default so a partial (or missing) file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// Directory containing `sessions/active`.
    #[serde(default = "default_root_storage_path")]
    pub root_storage_path: PathBuf,
    /// Home directory used to resolve `~` in project paths.
    #[serde(default = "default_user_home")]
    pub user_home: PathBuf,
    /// Whether projects shared by other users may be listed.
    #[serde(default)]
    pub project_sharing_enabled: bool,
    /// Session count polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Directory holding server-wide session records.
    /// Defaults to `<root_storage_path>/global-sessions`.
    #[serde(default)]
    pub global_sessions_path: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_storage_path: default_root_storage_path(),
            user_home: default_user_home(),
            project_sharing_enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            global_sessions_path: None,
        }
    }
}

fn default_user_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

fn default_root_storage_path() -> PathBuf {
    default_user_home().join(".local/share/rstudio")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl RegistryConfig {
    /// Loads the YAML file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        };
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given (defaults otherwise), then applies environment
    /// overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT).filter(|v| !v.is_empty()) {
            self.root_storage_path = PathBuf::from(root);
        }

        if let Some(ms) = lookup(ENV_POLL_MS) {
            self.poll_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds: {:?}", ENV_POLL_MS, ms))?;
        }

        if let Some(sharing) = lookup(ENV_PROJECT_SHARING) {
            self.project_sharing_enabled =
                matches!(sharing.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        self.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn global_sessions_path(&self) -> PathBuf {
        self.global_sessions_path
            .clone()
            .unwrap_or_else(|| self.root_storage_path.join("global-sessions"))
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.root_storage_path.as_os_str().is_empty() {
            anyhow::bail!("root_storage_path must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
