use std::fs;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::cursor::ColumnMap;
use crate::database::{
    ConnectionId, ConnectionState, Database, DatabaseSpec, Lifecycle, SharedHandle,
    TransactionState,
};
use crate::error::{SqlError, from_turso};
use crate::schema::{SchemaTarget, migrate};
use crate::sql_text::single_statement;
use crate::types::{Backend, CursorMode};

use super::TursoSession;
use super::config::TursoOptions;
use super::prepared::TursoPreparedStatement;
use super::query::{TursoCursor, TursoRows, column_map, last_insert_rowid};

/// A connection to one Turso database.
///
/// Every call blocks on the connection's own current-thread runtime, so these
/// methods must not be called from inside another tokio runtime.
#[derive(Debug)]
pub struct TursoDatabase {
    lifecycle: Lifecycle,
    options: TursoOptions,
    cursor_mode: CursorMode,
    runtime: Option<Arc<Runtime>>,
    handle: SharedHandle<TursoSession>,
}

/// Schema hooks over an open turso connection.
struct TursoSchema<'a> {
    runtime: &'a Runtime,
    conn: &'a turso::Connection,
}

impl TursoSchema<'_> {
    fn batch(&self, sql: &str, context: &str) -> Result<(), SqlError> {
        self.runtime
            .block_on(self.conn.execute_batch(sql))
            .map_err(|e| from_turso(context, &e))
    }

    fn run_script(&self, script: &str, version: i64) -> Result<(), SqlError> {
        if !script.trim().is_empty() {
            self.batch(script, "schema script failed")?;
        }
        self.batch(
            &format!("PRAGMA user_version = {version}"),
            "failed to store schema version",
        )?;
        self.batch("COMMIT", "failed to commit schema")
    }
}

async fn query_user_version(conn: &turso::Connection) -> Result<Option<turso::Value>, turso::Error> {
    let mut stmt = conn.prepare("PRAGMA user_version").await?;
    let mut rows = stmt.query(()).await?;
    match rows.next().await? {
        Some(row) => row.get_value(0).map(Some),
        None => Ok(None),
    }
}

impl SchemaTarget for TursoSchema<'_> {
    fn stored_version(&mut self) -> Result<i64, SqlError> {
        let value = self
            .runtime
            .block_on(query_user_version(self.conn))
            .map_err(|e| from_turso("failed to read schema version", &e))?;
        match value {
            Some(turso::Value::Integer(version)) => Ok(version),
            None | Some(turso::Value::Null) => Ok(0),
            Some(_) => Err(SqlError::ConnectionError(
                "schema version is not an integer".into(),
            )),
        }
    }

    fn apply_script(&mut self, script: &str, version: i64) -> Result<(), SqlError> {
        self.batch("BEGIN", "failed to start schema transaction")?;
        let applied = self.run_script(script, version);
        if applied.is_err() {
            let _ = self.batch("ROLLBACK", "failed to roll back schema");
        }
        applied
    }
}

impl TursoDatabase {
    #[must_use]
    pub fn new(spec: DatabaseSpec, options: TursoOptions) -> Self {
        Self {
            lifecycle: Lifecycle::new(spec),
            options,
            cursor_mode: CursorMode::Native,
            runtime: None,
            handle: SharedHandle::empty(),
        }
    }

    /// Ask for a materialization strategy; `Native` streams.
    #[must_use]
    pub fn with_cursor_mode(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }

    #[must_use]
    pub fn options(&self) -> &TursoOptions {
        &self.options
    }

    fn streaming(&self) -> bool {
        self.cursor_mode != CursorMode::Buffered
    }

    fn runtime(&self) -> Result<Arc<Runtime>, SqlError> {
        self.runtime.clone().ok_or_else(|| {
            SqlError::ConnectionError("setup_database must be called first".into())
        })
    }

    fn batch(&self, sql: &str, context: &str) -> Result<(), SqlError> {
        let runtime = self.runtime()?;
        self.handle.with(|session| {
            runtime
                .block_on(session.conn.execute_batch(sql))
                .map_err(|e| from_turso(context, &e))
        })
    }

    fn query(&self, sql: &str) -> Result<(turso::Statement, ColumnMap, turso::Rows), SqlError> {
        let runtime = self.runtime()?;
        self.handle.with(|session| {
            runtime.block_on(async {
                let mut stmt = session
                    .conn
                    .prepare(sql)
                    .await
                    .map_err(|e| from_turso("raw_query failed", &e))?;
                let columns = column_map(&stmt);
                let rows = stmt
                    .query(())
                    .await
                    .map_err(|e| from_turso("raw_query failed", &e))?;
                Ok::<_, SqlError>((stmt, columns, rows))
            })
        })
    }

    /// `true` when the engine is outside any transaction. A closed handle
    /// reports `false` so the recorded state is left alone.
    fn engine_autocommit(&self) -> bool {
        self.handle
            .with(|session| {
                session
                    .conn
                    .is_autocommit()
                    .map_err(|e| from_turso("failed to read autocommit state", &e))
            })
            .unwrap_or(false)
    }

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
        if let Err(err) = self.batch("ROLLBACK", "failed to roll back") {
            tracing::warn!(database = %self.lifecycle.spec.name, error = %err, "implicit rollback failed");
        }
        self.lifecycle.mark_ended();
    }
}

impl Database for TursoDatabase {
    type Cursor = TursoCursor;
    type Statement = TursoPreparedStatement;

    fn id(&self) -> ConnectionId {
        self.lifecycle.id
    }

    fn spec(&self) -> &DatabaseSpec {
        &self.lifecycle.spec
    }

    fn backend(&self) -> Backend {
        Backend::Turso
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
        self.options.path_str()?;
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| SqlError::ConnectionError(format!("failed to start runtime: {e}")))?;
            self.runtime = Some(Arc::new(runtime));
        }
        tracing::debug!(
            database = %self.lifecycle.spec.name,
            streaming = self.streaming(),
            "setup"
        );
        self.lifecycle.mark_set_up();
        Ok(())
    }

    fn open_or_create_database(&mut self) -> Result<(), SqlError> {
        self.lifecycle.ensure_set_up()?;
        let runtime = self.runtime()?;
        let path = self.options.path_str()?;
        if !self.options.is_in_memory() {
            if let Some(parent) = self.options.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    SqlError::ConnectionError(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let session = runtime
            .block_on(async {
                let database = turso::Builder::new_local(path).build().await?;
                let conn = database.connect()?;
                conn.busy_timeout(self.options.busy_timeout)?;
                Ok::<_, turso::Error>(TursoSession {
                    _database: database,
                    conn,
                })
            })
            .map_err(|e| SqlError::ConnectionError(format!("failed to open {path}: {e}")))?;
        migrate(
            &mut TursoSchema {
                runtime: &runtime,
                conn: &session.conn,
            },
            &self.lifecycle.spec,
        )?;
        self.handle.install(session);
        self.lifecycle.mark_open();
        tracing::debug!(database = %self.lifecycle.spec.name, path, "opened");
        Ok(())
    }

    fn close_database(&mut self) -> Result<(), SqlError> {
        self.lifecycle.ensure_open("close")?;
        self.rollback_on_release("closing database");
        self.handle.take();
        self.lifecycle.mark_closed();
        tracing::debug!(database = %self.lifecycle.spec.name, "closed");
        Ok(())
    }

    fn exec_sql(&mut self, sql: &str) -> Result<(), SqlError> {
        self.lifecycle.ensure_open("exec_sql")?;
        let statement = single_statement(sql)?;
        let runtime = self.runtime()?;
        let result = self.handle.with(|session| {
            runtime
                .block_on(session.conn.execute(statement, ()))
                .map(|_| ())
                .map_err(|e| from_turso("exec_sql failed", &e))
        });
        self.guard(result)
    }

    fn raw_query(&mut self, sql: &str) -> Result<TursoCursor, SqlError> {
        self.lifecycle.ensure_open("raw_query")?;
        let statement = single_statement(sql)?;
        let (stmt, columns, rows) = self.query(statement)?;
        let source = TursoRows::new(self.runtime()?, self.handle.clone(), rows, Some(stmt));
        TursoCursor::open(self.id(), self.streaming(), columns, source)
    }

    fn raw_query_into<'c>(
        &mut self,
        cursor: &'c mut TursoCursor,
        sql: &str,
    ) -> Result<&'c mut TursoCursor, SqlError> {
        if cursor.origin() != self.id() {
            tracing::warn!(database = %self.lifecycle.spec.name, "refused re-query into a foreign cursor");
            return Err(SqlError::CursorError(
                "cursor was not produced by this connection".into(),
            ));
        }
        self.lifecycle.ensure_open("raw_query")?;
        let statement = single_statement(sql)?;
        let (stmt, columns, rows) = self.query(statement)?;
        let source = TursoRows::new(self.runtime()?, self.handle.clone(), rows, Some(stmt));
        cursor.repopulate(self.streaming(), columns, source)?;
        Ok(cursor)
    }

    fn get_prepared_statement(&mut self, sql: &str) -> Result<TursoPreparedStatement, SqlError> {
        self.lifecycle.ensure_open("get_prepared_statement")?;
        Ok(TursoPreparedStatement::new(
            self.id(),
            self.handle.clone(),
            self.runtime()?,
            self.streaming(),
            sql,
        ))
    }

    fn begin_transaction(&mut self) -> Result<(), SqlError> {
        self.sync_with_engine();
        self.lifecycle.ensure_can_begin()?;
        self.batch("BEGIN", "failed to begin transaction")?;
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
        let result = self.batch(sql, "failed to end transaction");
        self.guard(result)?;
        self.lifecycle.mark_ended();
        tracing::debug!(database = %self.lifecycle.spec.name, commit, "transaction ended");
        Ok(())
    }

    fn get_last_row_id(&mut self) -> Result<i64, SqlError> {
        self.lifecycle.ensure_open("get_last_row_id")?;
        let runtime = self.runtime()?;
        self.handle
            .with(|session| last_insert_rowid(&runtime, &session.conn))
    }
}

impl Drop for TursoDatabase {
    fn drop(&mut self) {
        if self.lifecycle.state() == ConnectionState::Open {
            self.rollback_on_release("connection dropped");
            self.handle.take();
        }
    }
}
