use rusqlite::{CachedStatement, Connection};
use tracing::debug;

use crate::cursor::BufferedCursor;
use crate::database::{ConnectionId, SharedHandle};
use crate::error::{SqlError, from_sqlite};
use crate::statement::{ParamBindings, PreparedStatement, statement_closed};

use super::params::bind_all;
use super::query::{buffered_query, run_to_end};

/// Prepared statement on a `SQLite` connection.
///
/// The compiled form lives in the connection's statement cache, so repeated
/// executions skip parsing. Closing the statement evicts it from the cache.
#[derive(Debug)]
pub struct SqlitePreparedStatement {
    origin: ConnectionId,
    handle: SharedHandle<Connection>,
    sql: String,
    bindings: ParamBindings,
    placeholders: Option<usize>,
    closed: bool,
}

impl SqlitePreparedStatement {
    pub(crate) fn new(origin: ConnectionId, handle: SharedHandle<Connection>, sql: &str) -> Self {
        Self {
            origin,
            handle,
            sql: sql.to_owned(),
            bindings: ParamBindings::new(),
            placeholders: None,
            closed: false,
        }
    }

    /// Number of placeholders, known once the statement has been compiled.
    #[must_use]
    pub fn placeholder_count(&self) -> Option<usize> {
        self.placeholders
    }

    fn run<R>(
        &mut self,
        func: impl FnOnce(&Connection, &mut CachedStatement<'_>, &ParamBindings) -> Result<R, SqlError>,
    ) -> Result<R, SqlError> {
        if self.closed {
            return Err(statement_closed());
        }
        let sql = &self.sql;
        let bindings = &self.bindings;
        let placeholders = &mut self.placeholders;
        self.handle.with(|conn| {
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| from_sqlite("failed to compile statement", e))?;
            if placeholders.is_none() {
                debug!(sql = %sql, "compiled statement");
            }
            *placeholders = Some(stmt.parameter_count());
            func(conn, &mut stmt, bindings)
        })
    }
}

impl PreparedStatement for SqlitePreparedStatement {
    type Cursor = BufferedCursor;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn is_compiled(&self) -> bool {
        !self.closed && self.placeholders.is_some()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn bindings(&self) -> &ParamBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> Result<&mut ParamBindings, SqlError> {
        if self.closed {
            Err(statement_closed())
        } else {
            Ok(&mut self.bindings)
        }
    }

    fn execute(&mut self) -> Result<(), SqlError> {
        self.run(|_, stmt, bindings| run_to_end(stmt, bindings))
    }

    fn execute_insert(&mut self) -> Result<i64, SqlError> {
        self.run(|conn, stmt, bindings| {
            bind_all(stmt, bindings)?;
            let changed = stmt
                .raw_execute()
                .map_err(|e| from_sqlite("failed to execute insert", e))?;
            Ok(if changed == 0 {
                -1
            } else {
                conn.last_insert_rowid()
            })
        })
    }

    fn execute_update_delete(&mut self) -> Result<u64, SqlError> {
        self.run(|_, stmt, bindings| {
            bind_all(stmt, bindings)?;
            let changed = stmt
                .raw_execute()
                .map_err(|e| from_sqlite("failed to execute update", e))?;
            u64::try_from(changed)
                .map_err(|e| SqlError::ExecutionError(format!("affected row count overflow: {e}")))
        })
    }

    fn execute_query(&mut self) -> Result<BufferedCursor, SqlError> {
        let origin = self.origin;
        self.run(|_, stmt, bindings| buffered_query(origin, stmt, bindings))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.bindings.clear();
        if self.placeholders.take().is_some() {
            let sql = &self.sql;
            // A closed connection already dropped its cache.
            let _ = self.handle.with(|conn| {
                if let Ok(stmt) = conn.prepare_cached(sql) {
                    stmt.discard();
                }
                Ok(())
            });
            debug!(sql = %self.sql, "closed statement");
        }
    }
}
