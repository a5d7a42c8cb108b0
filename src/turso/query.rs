use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Runtime;

use crate::cursor::{BufferedCursor, ColumnMap, Cursor, Position, RowSource, StreamingCursor};
use crate::database::{ConnectionId, SharedHandle};
use crate::error::{SqlError, from_turso};
use crate::types::CellValue;

use super::TursoSession;
use super::params::cell_from_turso_value;

/// A turso result stepped on demand.
///
/// Each fetch checks that the owning connection is still open and, for rows
/// of a prepared statement, that the statement has not run again since.
pub struct TursoRows {
    runtime: Arc<Runtime>,
    handle: SharedHandle<TursoSession>,
    rows: Option<turso::Rows>,
    // Keeps a one-off statement alive for as long as its rows are read.
    _statement: Option<turso::Statement>,
    run: Option<(Arc<AtomicU64>, u64)>,
}

impl TursoRows {
    pub(crate) fn new(
        runtime: Arc<Runtime>,
        handle: SharedHandle<TursoSession>,
        rows: turso::Rows,
        statement: Option<turso::Statement>,
    ) -> Self {
        Self {
            runtime,
            handle,
            rows: Some(rows),
            _statement: statement,
            run: None,
        }
    }

    /// Tie these rows to run `run` of a statement whose current run is
    /// tracked by `generation`.
    pub(crate) fn invalidated_after(mut self, generation: Arc<AtomicU64>, run: u64) -> Self {
        self.run = Some((generation, run));
        self
    }

    fn check_current(&self) -> Result<(), SqlError> {
        match &self.run {
            Some((generation, run)) if generation.load(Ordering::Acquire) != *run => {
                Err(SqlError::CursorError(
                    "cursor invalidated by a later execution of its statement".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl RowSource for TursoRows {
    fn fetch(&mut self) -> Result<Option<Vec<CellValue>>, SqlError> {
        if self.rows.is_none() {
            return Ok(None);
        }
        if !self.handle.is_open() {
            return Err(SqlError::ConnectionError(
                "database closed while reading results".into(),
            ));
        }
        self.check_current()?;
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        let next = self
            .runtime
            .block_on(rows.next())
            .map_err(|e| from_turso("failed to fetch row", &e))?;
        let Some(row) = next else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(row.column_count());
        for idx in 0..row.column_count() {
            let value = row
                .get_value(idx)
                .map_err(|e| from_turso("failed to read column", &e))?;
            values.push(cell_from_turso_value(value));
        }
        Ok(Some(values))
    }

    fn release(&mut self) {
        self.rows = None;
        self._statement = None;
        self.run = None;
    }
}

pub(crate) fn column_map(stmt: &turso::Statement) -> ColumnMap {
    ColumnMap::new(
        stmt.columns()
            .iter()
            .map(|col| col.name().to_owned())
            .collect(),
    )
}

/// Cursor returned by a turso connection; its strategy follows the
/// connection's cursor mode.
#[derive(Debug)]
pub enum TursoCursor {
    Buffered(BufferedCursor),
    Streaming(StreamingCursor<TursoRows>),
}

impl TursoCursor {
    pub(crate) fn open(
        origin: ConnectionId,
        streaming: bool,
        columns: ColumnMap,
        source: TursoRows,
    ) -> Result<Self, SqlError> {
        if streaming {
            Ok(TursoCursor::Streaming(StreamingCursor::new(
                origin, columns, source,
            )))
        } else {
            BufferedCursor::from_source(origin, columns, source).map(TursoCursor::Buffered)
        }
    }

    /// Load a new result, keeping the cursor's strategy where it matches.
    pub(crate) fn repopulate(
        &mut self,
        streaming: bool,
        columns: ColumnMap,
        source: TursoRows,
    ) -> Result<(), SqlError> {
        let origin = self.origin();
        match self {
            TursoCursor::Streaming(cursor) if streaming => {
                cursor.repopulate(columns, source);
                Ok(())
            }
            TursoCursor::Buffered(cursor) if !streaming => cursor.repopulate_from(columns, source),
            _ => {
                *self = TursoCursor::open(origin, streaming, columns, source)?;
                Ok(())
            }
        }
    }

    pub(crate) fn origin(&self) -> ConnectionId {
        match self {
            TursoCursor::Buffered(cursor) => cursor.origin(),
            TursoCursor::Streaming(cursor) => cursor.origin(),
        }
    }

    fn inner(&self) -> &dyn Cursor {
        match self {
            TursoCursor::Buffered(cursor) => cursor,
            TursoCursor::Streaming(cursor) => cursor,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Cursor {
        match self {
            TursoCursor::Buffered(cursor) => cursor,
            TursoCursor::Streaming(cursor) => cursor,
        }
    }
}

impl Cursor for TursoCursor {
    fn next(&mut self) -> Result<bool, SqlError> {
        self.inner_mut().next()
    }

    fn count(&mut self) -> Result<usize, SqlError> {
        self.inner_mut().count()
    }

    fn reposition(&mut self, row: i64) -> Result<(), SqlError> {
        self.inner_mut().reposition(row)
    }

    fn position(&self) -> Position {
        self.inner().position()
    }

    fn columns(&self) -> &ColumnMap {
        self.inner().columns()
    }

    fn current_row(&self) -> Result<&[CellValue], SqlError> {
        self.inner().current_row()
    }

    fn close(&mut self) {
        self.inner_mut().close();
    }

    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }

    fn supports_random_access(&self) -> bool {
        self.inner().supports_random_access()
    }
}

async fn query_last_rowid(conn: &turso::Connection) -> Result<Option<turso::Value>, turso::Error> {
    let mut stmt = conn.prepare("SELECT last_insert_rowid()").await?;
    let mut rows = stmt.query(()).await?;
    match rows.next().await? {
        Some(row) => row.get_value(0).map(Some),
        None => Ok(None),
    }
}

/// Read `SELECT last_insert_rowid()`; `-1` when nothing has been inserted.
pub(crate) fn last_insert_rowid(runtime: &Runtime, conn: &turso::Connection) -> Result<i64, SqlError> {
    let id = runtime
        .block_on(query_last_rowid(conn))
        .map_err(|e| from_turso("failed to read last insert row id", &e))?;
    match id {
        Some(turso::Value::Integer(id)) if id != 0 => Ok(id),
        _ => Ok(-1),
    }
}
