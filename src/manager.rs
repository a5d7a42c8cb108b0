//! Backend selection.
//!
//! [`DatabaseManager`] picks the engine for the host once, and hands out
//! [`AnyDatabase`] values that forward to the concrete backend. Cursors and
//! statements come back wrapped the same way, so callers never inspect
//! concrete types.

use crate::config::HostConfig;
use crate::cursor::{ColumnMap, Cursor, Position};
use crate::database::{ConnectionId, ConnectionState, Database, DatabaseSpec, TransactionState};
use crate::error::SqlError;
use crate::statement::{ParamBindings, PreparedStatement};
use crate::types::{Backend, CellValue};

#[cfg(feature = "sqlite")]
use crate::cursor::BufferedCursor;
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteDatabase, SqliteOptions, SqlitePreparedStatement};
#[cfg(feature = "turso")]
use crate::turso::{TursoCursor, TursoDatabase, TursoOptions, TursoPreparedStatement};

/// Forward a call to whichever backend variant `$value` holds.
macro_rules! dispatch {
    ($value:expr, $enum:ident, $inner:ident => $body:expr) => {
        match $value {
            #[cfg(feature = "sqlite")]
            $enum::Sqlite($inner) => $body,
            #[cfg(feature = "turso")]
            $enum::Turso($inner) => $body,
        }
    };
}

/// Produces connections for the configured host.
#[derive(Debug, Clone, Default)]
pub struct DatabaseManager {
    config: HostConfig,
}

impl DatabaseManager {
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    /// Manager with default settings for the platform this binary targets.
    #[must_use]
    pub fn for_host() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.config.resolved_backend()
    }

    /// Construct a connection without touching the file system.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` when the configured backend was not
    /// compiled into this build.
    pub fn get_new_database(
        &self,
        name: &str,
        version: i64,
        create_ddl: &str,
        upgrade_ddl: &str,
    ) -> Result<AnyDatabase, SqlError> {
        let spec = DatabaseSpec::new(name, version, create_ddl, upgrade_ddl);
        let backend = self.backend();
        tracing::debug!(database = name, ?backend, "constructing connection");
        match backend {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Ok(AnyDatabase::Sqlite(
                SqliteDatabase::new(spec, SqliteOptions::for_host(&self.config, name))
                    .with_cursor_mode(self.config.cursor_mode),
            )),
            #[cfg(feature = "turso")]
            Backend::Turso => Ok(AnyDatabase::Turso(
                TursoDatabase::new(spec, TursoOptions::for_host(&self.config, name))
                    .with_cursor_mode(self.config.cursor_mode),
            )),
            #[allow(unreachable_patterns)]
            other => Err(SqlError::ConfigError(format!(
                "backend {other:?} is not compiled into this build"
            ))),
        }
    }
}

/// A connection to whichever backend the manager selected.
#[derive(Debug)]
pub enum AnyDatabase {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteDatabase),
    #[cfg(feature = "turso")]
    Turso(TursoDatabase),
}

/// A cursor from an [`AnyDatabase`].
#[derive(Debug)]
pub enum AnyCursor {
    #[cfg(feature = "sqlite")]
    Sqlite(BufferedCursor),
    #[cfg(feature = "turso")]
    Turso(TursoCursor),
}

/// A prepared statement from an [`AnyDatabase`].
#[derive(Debug)]
pub enum AnyStatement {
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePreparedStatement),
    #[cfg(feature = "turso")]
    Turso(TursoPreparedStatement),
}

impl Database for AnyDatabase {
    type Cursor = AnyCursor;
    type Statement = AnyStatement;

    fn id(&self) -> ConnectionId {
        dispatch!(self, AnyDatabase, db => db.id())
    }

    fn spec(&self) -> &DatabaseSpec {
        dispatch!(self, AnyDatabase, db => db.spec())
    }

    fn backend(&self) -> Backend {
        dispatch!(self, AnyDatabase, db => db.backend())
    }

    fn state(&self) -> ConnectionState {
        dispatch!(self, AnyDatabase, db => db.state())
    }

    fn transaction_state(&self) -> TransactionState {
        dispatch!(self, AnyDatabase, db => db.transaction_state())
    }

    fn setup_database(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.setup_database())
    }

    fn open_or_create_database(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.open_or_create_database())
    }

    fn close_database(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.close_database())
    }

    fn exec_sql(&mut self, sql: &str) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.exec_sql(sql))
    }

    fn raw_query(&mut self, sql: &str) -> Result<AnyCursor, SqlError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(db) => db.raw_query(sql).map(AnyCursor::Sqlite),
            #[cfg(feature = "turso")]
            AnyDatabase::Turso(db) => db.raw_query(sql).map(AnyCursor::Turso),
        }
    }

    fn raw_query_into<'c>(
        &mut self,
        cursor: &'c mut AnyCursor,
        sql: &str,
    ) -> Result<&'c mut AnyCursor, SqlError> {
        #[allow(unreachable_patterns)]
        match (&mut *self, &mut *cursor) {
            #[cfg(feature = "sqlite")]
            (AnyDatabase::Sqlite(db), AnyCursor::Sqlite(inner)) => {
                db.raw_query_into(inner, sql)?;
            }
            #[cfg(feature = "turso")]
            (AnyDatabase::Turso(db), AnyCursor::Turso(inner)) => {
                db.raw_query_into(inner, sql)?;
            }
            _ => {
                return Err(SqlError::CursorError(
                    "cursor was produced by a different backend".into(),
                ));
            }
        }
        Ok(cursor)
    }

    fn get_prepared_statement(&mut self, sql: &str) -> Result<AnyStatement, SqlError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(db) => db.get_prepared_statement(sql).map(AnyStatement::Sqlite),
            #[cfg(feature = "turso")]
            AnyDatabase::Turso(db) => db.get_prepared_statement(sql).map(AnyStatement::Turso),
        }
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.begin_transaction())
    }

    fn set_transaction_successful(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.set_transaction_successful())
    }

    fn end_transaction(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyDatabase, db => db.end_transaction())
    }

    fn get_last_row_id(&mut self) -> Result<i64, SqlError> {
        dispatch!(self, AnyDatabase, db => db.get_last_row_id())
    }
}

impl Cursor for AnyCursor {
    fn next(&mut self) -> Result<bool, SqlError> {
        dispatch!(self, AnyCursor, c => c.next())
    }

    fn count(&mut self) -> Result<usize, SqlError> {
        dispatch!(self, AnyCursor, c => c.count())
    }

    fn reposition(&mut self, row: i64) -> Result<(), SqlError> {
        dispatch!(self, AnyCursor, c => c.reposition(row))
    }

    fn position(&self) -> Position {
        dispatch!(self, AnyCursor, c => c.position())
    }

    fn columns(&self) -> &ColumnMap {
        dispatch!(self, AnyCursor, c => c.columns())
    }

    fn current_row(&self) -> Result<&[CellValue], SqlError> {
        dispatch!(self, AnyCursor, c => c.current_row())
    }

    fn close(&mut self) {
        dispatch!(self, AnyCursor, c => c.close());
    }

    fn is_closed(&self) -> bool {
        dispatch!(self, AnyCursor, c => c.is_closed())
    }

    fn supports_random_access(&self) -> bool {
        dispatch!(self, AnyCursor, c => c.supports_random_access())
    }
}

impl PreparedStatement for AnyStatement {
    type Cursor = AnyCursor;

    fn sql(&self) -> &str {
        dispatch!(self, AnyStatement, s => s.sql())
    }

    fn is_compiled(&self) -> bool {
        dispatch!(self, AnyStatement, s => s.is_compiled())
    }

    fn is_closed(&self) -> bool {
        dispatch!(self, AnyStatement, s => s.is_closed())
    }

    fn bindings(&self) -> &ParamBindings {
        dispatch!(self, AnyStatement, s => s.bindings())
    }

    fn bindings_mut(&mut self) -> Result<&mut ParamBindings, SqlError> {
        dispatch!(self, AnyStatement, s => s.bindings_mut())
    }

    fn execute(&mut self) -> Result<(), SqlError> {
        dispatch!(self, AnyStatement, s => s.execute())
    }

    fn execute_insert(&mut self) -> Result<i64, SqlError> {
        dispatch!(self, AnyStatement, s => s.execute_insert())
    }

    fn execute_update_delete(&mut self) -> Result<u64, SqlError> {
        dispatch!(self, AnyStatement, s => s.execute_update_delete())
    }

    fn execute_query(&mut self) -> Result<AnyCursor, SqlError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.execute_query().map(AnyCursor::Sqlite),
            #[cfg(feature = "turso")]
            AnyStatement::Turso(s) => s.execute_query().map(AnyCursor::Turso),
        }
    }

    fn close(&mut self) {
        dispatch!(self, AnyStatement, s => s.close());
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::types::CursorMode;

    #[test]
    fn construction_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DatabaseManager::new(
            HostConfig::builder()
                .data_dir(dir.path())
                .backend(Backend::Sqlite)
                .finish(),
        );
        let db = manager.get_new_database("app.db", 1, "", "").unwrap();
        assert_eq!(db.state(), ConnectionState::Uninitialized);
        assert_eq!(db.backend(), Backend::Sqlite);
        assert!(!dir.path().join("app.db").exists());
    }

    #[test]
    fn streaming_is_refused_by_sqlite_at_setup() {
        let manager = DatabaseManager::new(
            HostConfig::builder()
                .backend(Backend::Sqlite)
                .cursor_mode(CursorMode::Streaming)
                .finish(),
        );
        let mut db = manager.get_new_database(":memory:", 1, "", "").unwrap();
        assert!(matches!(db.setup_database(), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn bad_version_is_a_config_error() {
        let mut db = DatabaseManager::for_host()
            .get_new_database(":memory:", 0, "", "")
            .unwrap();
        assert!(matches!(db.setup_database(), Err(SqlError::ConfigError(_))));
    }
}
