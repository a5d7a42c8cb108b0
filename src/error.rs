use thiserror::Error;

/// Errors surfaced by every backend.
///
/// Native driver failures never cross the API boundary as-is: each backend
/// translates them into one of these variants, keeping the driver's diagnostic
/// text in the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Lock contention reported by the engine. Callers may retry.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Parameter binding error: {0}")]
    BindingError(String),

    #[error("Cursor error: {0}")]
    CursorError(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`SqlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Execution,
    Binding,
    Cursor,
    Unsupported,
    Config,
}

impl SqlError {
    /// The error family. [`SqlError::Busy`] is an execution failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::ConnectionError(_) => ErrorKind::Connection,
            SqlError::ExecutionError(_) | SqlError::Busy(_) => ErrorKind::Execution,
            SqlError::BindingError(_) => ErrorKind::Binding,
            SqlError::CursorError(_) => ErrorKind::Cursor,
            SqlError::Unsupported(_) => ErrorKind::Unsupported,
            SqlError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// True when the engine refused the operation because of a lock held elsewhere.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, SqlError::Busy(_))
    }

    pub(crate) fn cursor_closed() -> Self {
        SqlError::CursorError("cursor is closed".into())
    }
}

/// Translate a rusqlite failure, prefixing `context` to the driver message.
#[cfg(feature = "sqlite")]
pub(crate) fn from_sqlite(context: &str, err: rusqlite::Error) -> SqlError {
    use rusqlite::ErrorCode;

    match &err {
        rusqlite::Error::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                SqlError::Busy(format!("{context}: {err}"))
            }
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
                SqlError::ConnectionError(format!("{context}: {err}"))
            }
            ErrorCode::ParameterOutOfRange => SqlError::BindingError(format!("{context}: {err}")),
            _ => SqlError::ExecutionError(format!("{context}: {err}")),
        },
        rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::ToSqlConversionFailure(_) => {
            SqlError::BindingError(format!("{context}: {err}"))
        }
        rusqlite::Error::InvalidColumnIndex(_) | rusqlite::Error::InvalidColumnName(_) => {
            SqlError::CursorError(format!("{context}: {err}"))
        }
        _ => SqlError::ExecutionError(format!("{context}: {err}")),
    }
}

/// Translate a turso failure. The engine exposes no structured busy code, so
/// lock contention is recognised from the diagnostic text.
#[cfg(feature = "turso")]
pub(crate) fn from_turso(context: &str, err: &turso::Error) -> SqlError {
    let message = err.to_string();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("busy") || lowered.contains("locked") {
        SqlError::Busy(format!("{context}: {message}"))
    } else {
        SqlError::ExecutionError(format!("{context}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_an_execution_error() {
        let err = SqlError::Busy("database is locked".into());
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.is_busy());
        assert!(!SqlError::ExecutionError("x".into()).is_busy());
    }

    #[test]
    fn messages_carry_context() {
        let err = SqlError::CursorError("column not found: foo".into());
        assert_eq!(format!("{err}"), "Cursor error: column not found: foo");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_busy_maps_to_busy() {
        let native = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            None,
        );
        let err = from_sqlite("commit", native);
        assert!(err.is_busy());
        assert!(err.to_string().contains("commit"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_cannot_open_maps_to_connection() {
        let native = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::CannotOpen,
                extended_code: 14,
            },
            Some("unable to open database file".into()),
        );
        assert_eq!(from_sqlite("open", native).kind(), ErrorKind::Connection);
    }
}
