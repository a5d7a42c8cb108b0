use std::fs;

use rusqlite::Connection;

use crate::cursor::BufferedCursor;
use crate::database::{
    ConnectionId, ConnectionState, Database, DatabaseSpec, Lifecycle, SharedHandle,
    TransactionState,
};
use crate::error::{SqlError, from_sqlite};
use crate::schema::{SchemaTarget, migrate};
use crate::sql_text::single_statement;
use crate::statement::ParamBindings;
use crate::types::{Backend, CursorMode};

use super::config::SqliteOptions;
use super::prepared::SqlitePreparedStatement;
use super::query::{buffered_query, buffered_requery};

/// A connection to one `SQLite` database file.
///
/// Query results are always buffered: rusqlite statements borrow their
/// connection, so a lazily stepped result cannot outlive the call that
/// produced it.
#[derive(Debug)]
pub struct SqliteDatabase {
    lifecycle: Lifecycle,
    options: SqliteOptions,
    cursor_mode: CursorMode,
    handle: SharedHandle<Connection>,
    driver_version: Option<&'static str>,
}

impl SqliteDatabase {
    #[must_use]
    pub fn new(spec: DatabaseSpec, options: SqliteOptions) -> Self {
        Self {
            lifecycle: Lifecycle::new(spec),
            options,
            cursor_mode: CursorMode::Native,
            handle: SharedHandle::empty(),
            driver_version: None,
        }
    }

    /// Ask for a materialization strategy; checked by `setup_database`.
    #[must_use]
    pub fn with_cursor_mode(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// `SQLite` library version, known after `setup_database`.
    #[must_use]
    pub fn driver_version(&self) -> Option<&'static str> {
        self.driver_version
    }

    fn open_connection(&self) -> Result<Connection, SqlError> {
        let path = &self.options.path;
        let conn = if self.options.is_in_memory() {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    SqlError::ConnectionError(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            Connection::open(path)
        }
        .map_err(|e| {
            SqlError::ConnectionError(format!("failed to open {}: {e}", path.display()))
        })?;
        conn.busy_timeout(self.options.busy_timeout)
            .map_err(|e| from_sqlite("failed to set busy timeout", e))?;
        Ok(conn)
    }

    /// `true` when the engine is outside any transaction. A closed handle
    /// reports `false` so the recorded state is left alone.
    fn engine_autocommit(&self) -> bool {
        self.handle.with(|conn| Ok(conn.is_autocommit())).unwrap_or(false)
    }

    /// Catch up with a transaction the engine ended on its own, for example
    /// after a failing prepared statement.
    fn sync_with_engine(&mut self) {
        let autocommit = self.engine_autocommit();
        self.lifecycle.sync_with_engine(autocommit);
    }

    fn guard<R>(&mut self, result: Result<R, SqlError>) -> Result<R, SqlError> {
        if result.is_err() {
            self.sync_with_engine();
        }
        result
    }

    fn rollback_on_release(&mut self, reason: &str) {
        self.sync_with_engine();
        if !self.in_transaction() {
            return;
        }
        tracing::warn!(database = %self.lifecycle.spec.name, "{reason}; rolling back active transaction");
        if let Err(err) = self.handle.with(|conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(|e| from_sqlite("failed to roll back", e))
        }) {
            tracing::warn!(database = %self.lifecycle.spec.name, error = %err, "implicit rollback failed");
        }
        self.lifecycle.mark_ended();
    }
}

impl SchemaTarget for Connection {
    fn stored_version(&mut self) -> Result<i64, SqlError> {
        self.query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| from_sqlite("failed to read schema version", e))
    }

    fn apply_script(&mut self, script: &str, version: i64) -> Result<(), SqlError> {
        let tx = self
            .transaction()
            .map_err(|e| from_sqlite("failed to start schema transaction", e))?;
        tx.execute_batch(script)
            .map_err(|e| from_sqlite("schema script failed", e))?;
        tx.execute_batch(&format!("PRAGMA user_version = {version}"))
            .map_err(|e| from_sqlite("failed to store schema version", e))?;
        tx.commit()
            .map_err(|e| from_sqlite("failed to commit schema", e))
    }
}

impl Database for SqliteDatabase {
    type Cursor = BufferedCursor;
    type Statement = SqlitePreparedStatement;

    fn id(&self) -> ConnectionId {
        self.lifecycle.id
    }

    fn spec(&self) -> &DatabaseSpec {
        &self.lifecycle.spec
    }

    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn transaction_state(&self) -> TransactionState {
        self.lifecycle.observed_tx(self.engine_autocommit())
    }

    fn setup_database(&mut self) -> Result<(), SqlError> {
        if !self.lifecycle.needs_setup()? {
            return Ok(());
        }
        self.lifecycle.spec.validate()?;
        if self.cursor_mode == CursorMode::Streaming {
            return Err(SqlError::Unsupported(
                "the sqlite backend only supports buffered cursors".into(),
            ));
        }
        let version = rusqlite::version();
        tracing::debug!(database = %self.lifecycle.spec.name, sqlite = version, "setup");
        self.driver_version = Some(version);
        self.lifecycle.mark_set_up();
        Ok(())
    }

    fn open_or_create_database(&mut self) -> Result<(), SqlError> {
        self.lifecycle.ensure_set_up()?;
        let mut conn = self.open_connection()?;
        migrate(&mut conn, &self.lifecycle.spec)?;
        self.handle.install(conn);
        self.lifecycle.mark_open();
        tracing::debug!(
            database = %self.lifecycle.spec.name,
            path = %self.options.path.display(),
            "opened"
        );
        Ok(())
    }

    fn close_database(&mut self) -> Result<(), SqlError> {
        self.lifecycle.ensure_open("close")?;
        self.rollback_on_release("closing database");
        let Some(conn) = self.handle.take() else {
            return Err(SqlError::ConnectionError("database handle already released".into()));
        };
        if let Err((conn, err)) = conn.close() {
            self.handle.install(conn);
            return Err(SqlError::ConnectionError(format!(
                "failed to close {}: {err}",
                self.lifecycle.spec.name
            )));
        }
        self.lifecycle.mark_closed();
        tracing::debug!(database = %self.lifecycle.spec.name, "closed");
        Ok(())
    }

    fn exec_sql(&mut self, sql: &str) -> Result<(), SqlError> {
        self.lifecycle.ensure_open("exec_sql")?;
        let statement = single_statement(sql)?;
        let result = self.handle.with(|conn| {
            conn.execute_batch(statement)
                .map_err(|e| from_sqlite("exec_sql failed", e))
        });
        self.guard(result)
    }

    fn raw_query(&mut self, sql: &str) -> Result<BufferedCursor, SqlError> {
        self.lifecycle.ensure_open("raw_query")?;
        let statement = single_statement(sql)?;
        let origin = self.id();
        let result = self.handle.with(|conn| {
            let mut stmt = conn
                .prepare(statement)
                .map_err(|e| from_sqlite("raw_query failed", e))?;
            buffered_query(origin, &mut stmt, &ParamBindings::new())
        });
        self.guard(result)
    }

    fn raw_query_into<'c>(
        &mut self,
        cursor: &'c mut BufferedCursor,
        sql: &str,
    ) -> Result<&'c mut BufferedCursor, SqlError> {
        if cursor.origin() != self.id() {
            tracing::warn!(database = %self.lifecycle.spec.name, "refused re-query into a foreign cursor");
            return Err(SqlError::CursorError(
                "cursor was not produced by this connection".into(),
            ));
        }
        self.lifecycle.ensure_open("raw_query")?;
        let statement = single_statement(sql)?;
        let result = self.handle.with(|conn| {
            let mut stmt = conn
                .prepare(statement)
                .map_err(|e| from_sqlite("raw_query failed", e))?;
            buffered_requery(cursor, &mut stmt, &ParamBindings::new())
        });
        self.guard(result)?;
        Ok(cursor)
    }

    fn get_prepared_statement(&mut self, sql: &str) -> Result<SqlitePreparedStatement, SqlError> {
        self.lifecycle.ensure_open("get_prepared_statement")?;
        Ok(SqlitePreparedStatement::new(
            self.id(),
            self.handle.clone(),
            sql,
        ))
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        self.sync_with_engine();
        self.lifecycle.ensure_can_begin()?;
        self.handle.with(|conn| {
            conn.execute_batch("BEGIN")
                .map_err(|e| from_sqlite("failed to begin transaction", e))
        })?;
        self.lifecycle.mark_begun();
        tracing::debug!(database = %self.lifecycle.spec.name, "transaction started");
        Ok(())
    }

    fn set_transaction_successful(&mut self) -> Result<(), SqlError> {
        self.sync_with_engine();
        self.lifecycle.mark_successful()
    }

    fn end_transaction(&mut self) -> Result<(), SqlError> {
        self.sync_with_engine();
        let commit = self.lifecycle.ending()?;
        let sql = if commit { "COMMIT" } else { "ROLLBACK" };
        let result = self.handle.with(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| from_sqlite("failed to end transaction", e))
        });
        match result {
            Ok(()) => {
                self.lifecycle.mark_ended();
                tracing::debug!(database = %self.lifecycle.spec.name, commit, "transaction ended");
                Ok(())
            }
            Err(err) => {
                self.sync_with_engine();
                Err(err)
            }
        }
    }

    fn get_last_row_id(&mut self) -> Result<i64, SqlError> {
        self.lifecycle.ensure_open("get_last_row_id")?;
        let id = self.handle.with(|conn| Ok(conn.last_insert_rowid()))?;
        Ok(if id == 0 { -1 } else { id })
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        if self.lifecycle.state() == ConnectionState::Open {
            self.rollback_on_release("connection dropped");
            self.handle.take();
        }
    }
}
