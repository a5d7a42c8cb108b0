use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{HostConfig, IN_MEMORY};
use crate::error::SqlError;

/// Options for opening a Turso database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TursoOptions {
    pub path: PathBuf,
    /// Total time turso spends backing off on a locked database.
    pub busy_timeout: Duration,
}

impl TursoOptions {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: HostConfig::default().busy_timeout(),
        }
    }

    /// Resolve `name` against the host's data directory.
    #[must_use]
    pub fn for_host(host: &HostConfig, name: &str) -> Self {
        Self {
            path: host.resolve_path(name),
            busy_timeout: host.busy_timeout(),
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(IN_MEMORY)
    }

    /// The path as turso's builder expects it.
    pub(crate) fn path_str(&self) -> Result<&str, SqlError> {
        self.path.to_str().ok_or_else(|| {
            SqlError::ConfigError(format!(
                "database path is not valid UTF-8: {}",
                self.path.display()
            ))
        })
    }
}
