use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{HostConfig, IN_MEMORY};

/// Options for opening a `SQLite` database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl SqliteOptions {
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
}
