use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlError;
use crate::types::{Backend, CursorMode};

/// Path that keeps a database in memory instead of on disk.
pub const IN_MEMORY: &str = ":memory:";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Host environment settings shared by every connection a manager creates.
///
/// Loadable from JSON; absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory relative database names are resolved against. `None` means
    /// the process working directory.
    pub data_dir: Option<PathBuf>,
    /// Engine to use; `None` picks [`Backend::for_current_platform`].
    pub backend: Option<Backend>,
    pub cursor_mode: CursorMode,
    /// How long a statement waits on a locked database before failing busy.
    pub busy_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: None,
            cursor_mode: CursorMode::Native,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl HostConfig {
    #[must_use]
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::new()
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` if the JSON is malformed or names an
    /// unknown backend or cursor mode.
    pub fn from_json_str(json: &str) -> Result<Self, SqlError> {
        serde_json::from_str(json)
            .map_err(|e| SqlError::ConfigError(format!("invalid host configuration: {e}")))
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, SqlError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SqlError::ConfigError(format!("failed to serialize host configuration: {e}")))
    }

    #[must_use]
    pub fn resolved_backend(&self) -> Backend {
        self.backend.unwrap_or_else(Backend::for_current_platform)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Where the database called `name` lives on this host.
    #[must_use]
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if name == IN_MEMORY || path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.data_dir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Fluent builder for [`HostConfig`].
#[derive(Debug, Clone, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn cursor_mode(mut self, mode: CursorMode) -> Self {
        self.config.cursor_mode = mode;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn finish(self) -> HostConfig {
        self.config
    }
}
