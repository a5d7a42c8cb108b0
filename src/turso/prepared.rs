use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Runtime;

use crate::database::{ConnectionId, SharedHandle};
use crate::error::{SqlError, from_turso};
use crate::sql_text::placeholder_count;
use crate::statement::{ParamBindings, PreparedStatement, statement_closed};

use super::TursoSession;
use super::params::positional_params;
use super::query::{TursoCursor, TursoRows, column_map, last_insert_rowid};

/// Prepared statement on a Turso connection.
///
/// The SQL is compiled on first execution. Turso keeps the affected-row count
/// on the compiled program across runs, so every later execution compiles a
/// fresh program to report its own count. Each execution also invalidates the
/// streaming cursor returned by the previous `execute_query`.
pub struct TursoPreparedStatement {
    origin: ConnectionId,
    handle: SharedHandle<TursoSession>,
    runtime: Arc<Runtime>,
    streaming: bool,
    sql: String,
    placeholders: usize,
    bindings: ParamBindings,
    statement: Option<turso::Statement>,
    executed: bool,
    generation: Arc<AtomicU64>,
    closed: bool,
}

impl std::fmt::Debug for TursoPreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoPreparedStatement")
            .field("origin", &self.origin)
            .field("sql", &self.sql)
            .field("placeholders", &self.placeholders)
            .field("bindings", &self.bindings)
            .field("compiled", &self.statement.is_some())
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl TursoPreparedStatement {
    pub(crate) fn new(
        origin: ConnectionId,
        handle: SharedHandle<TursoSession>,
        runtime: Arc<Runtime>,
        streaming: bool,
        sql: &str,
    ) -> Self {
        Self {
            origin,
            handle,
            runtime,
            streaming,
            sql: sql.to_owned(),
            placeholders: placeholder_count(sql),
            bindings: ParamBindings::new(),
            statement: None,
            executed: false,
            generation: Arc::new(AtomicU64::new(0)),
            closed: false,
        }
    }

    /// Number of placeholders in the statement text.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    /// Stop the previous run: its cursors see a newer generation and the old
    /// program is reset so it releases its read state.
    fn retire_previous_run(&mut self) -> u64 {
        if self.executed {
            if let Some(old) = self.statement.take() {
                old.reset();
            }
        }
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Compile if needed and hand out the statement with its positional
    /// parameters and the generation of this run.
    fn ready(&mut self) -> Result<(&mut turso::Statement, turso::params::Params, u64), SqlError> {
        if self.closed {
            return Err(statement_closed());
        }
        if !self.handle.is_open() {
            return Err(SqlError::ConnectionError("database is not open".into()));
        }
        let params = positional_params(&self.bindings, self.placeholders)?;
        let generation = self.retire_previous_run();
        if self.statement.is_none() {
            let sql = &self.sql;
            let runtime = &self.runtime;
            let stmt = self.handle.with(|session| {
                runtime
                    .block_on(session.conn.prepare(sql))
                    .map_err(|e| from_turso("failed to compile statement", &e))
            })?;
            if !self.executed {
                tracing::debug!(sql = %self.sql, "compiled statement");
            }
            self.statement = Some(stmt);
        }
        self.executed = true;
        let stmt = self.statement.as_mut().ok_or_else(statement_closed)?;
        Ok((stmt, params, generation))
    }

    fn changes(&mut self, context: &str) -> Result<u64, SqlError> {
        let runtime = Arc::clone(&self.runtime);
        let (stmt, params, _) = self.ready()?;
        runtime
            .block_on(stmt.execute(params))
            .map_err(|e| from_turso(context, &e))
    }
}

async fn run_to_end(stmt: &mut turso::Statement, params: turso::params::Params) -> Result<(), turso::Error> {
    let mut rows = stmt.query(params).await?;
    while rows.next().await?.is_some() {}
    Ok(())
}

impl PreparedStatement for TursoPreparedStatement {
    type Cursor = TursoCursor;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn is_compiled(&self) -> bool {
        self.statement.is_some()
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

    // Steps through any rows the statement produces.
    fn execute(&mut self) -> Result<(), SqlError> {
        let runtime = Arc::clone(&self.runtime);
        let (stmt, params, _) = self.ready()?;
        runtime
            .block_on(run_to_end(stmt, params))
            .map_err(|e| from_turso("failed to execute statement", &e))
    }

    fn execute_insert(&mut self) -> Result<i64, SqlError> {
        let changed = self.changes("failed to execute insert")?;
        if changed == 0 {
            return Ok(-1);
        }
        let runtime = &self.runtime;
        self.handle
            .with(|session| last_insert_rowid(runtime, &session.conn))
    }

    fn execute_update_delete(&mut self) -> Result<u64, SqlError> {
        self.changes("failed to execute update")
    }

    fn execute_query(&mut self) -> Result<TursoCursor, SqlError> {
        let runtime = Arc::clone(&self.runtime);
        let handle = self.handle.clone();
        let generation = Arc::clone(&self.generation);
        let (origin, streaming) = (self.origin, self.streaming);
        let (stmt, params, run) = self.ready()?;
        let columns = column_map(stmt);
        let rows = runtime
            .block_on(stmt.query(params))
            .map_err(|e| from_turso("failed to run query", &e))?;
        TursoCursor::open(
            origin,
            streaming,
            columns,
            TursoRows::new(runtime, handle, rows, None).invalidated_after(generation, run),
        )
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.bindings.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(stmt) = self.statement.take() {
            stmt.reset();
            tracing::debug!(sql = %self.sql, "closed statement");
        }
    }
}
