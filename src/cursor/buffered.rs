use crate::database::ConnectionId;
use crate::error::SqlError;
use crate::types::CellValue;

use super::{ColumnMap, Cursor, Position, RowSource, checked_row, not_on_row};

/// Cursor over a result that was read into memory in full.
///
/// `count` is exact as soon as the query returns and `reposition` can move to
/// any row in either direction. Memory grows with the result; page large
/// queries with `LIMIT`/`OFFSET` instead.
#[derive(Debug, Clone)]
pub struct BufferedCursor {
    origin: ConnectionId,
    columns: ColumnMap,
    rows: Vec<Vec<CellValue>>,
    position: Position,
    closed: bool,
}

impl BufferedCursor {
    pub(crate) fn new(origin: ConnectionId, columns: ColumnMap, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            origin,
            columns,
            rows,
            position: Position::BeforeFirst,
            closed: false,
        }
    }

    /// Drain `source` into a new cursor.
    pub(crate) fn from_source<S: RowSource>(
        origin: ConnectionId,
        columns: ColumnMap,
        mut source: S,
    ) -> Result<Self, SqlError> {
        let rows = drain(&mut source)?;
        Ok(Self::new(origin, columns, rows))
    }

    /// Replace the buffered result, resetting position and reopening the cursor.
    pub(crate) fn repopulate(&mut self, columns: ColumnMap, rows: Vec<Vec<CellValue>>) {
        self.columns = columns;
        self.rows = rows;
        self.position = Position::BeforeFirst;
        self.closed = false;
    }

    /// Drain `source` and make its rows the cursor's result.
    pub(crate) fn repopulate_from<S: RowSource>(
        &mut self,
        columns: ColumnMap,
        mut source: S,
    ) -> Result<(), SqlError> {
        let rows = drain(&mut source)?;
        self.repopulate(columns, rows);
        Ok(())
    }

    pub(crate) fn origin(&self) -> ConnectionId {
        self.origin
    }

    /// Number of buffered rows; zero once closed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrow any buffered row without moving the cursor.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    fn ensure_open(&self) -> Result<(), SqlError> {
        if self.closed {
            Err(SqlError::cursor_closed())
        } else {
            Ok(())
        }
    }
}

pub(crate) fn drain<S: RowSource>(source: &mut S) -> Result<Vec<Vec<CellValue>>, SqlError> {
    let mut rows = Vec::new();
    while let Some(row) = source.fetch()? {
        rows.push(row);
    }
    source.release();
    Ok(rows)
}

impl Cursor for BufferedCursor {
    fn next(&mut self) -> Result<bool, SqlError> {
        self.ensure_open()?;
        if self.position == Position::AfterLast {
            return Ok(false);
        }
        let candidate = self.position.advanced();
        if candidate < self.rows.len() {
            self.position = Position::Row(candidate);
            Ok(true)
        } else {
            self.position = Position::AfterLast;
            Ok(false)
        }
    }

    fn count(&mut self) -> Result<usize, SqlError> {
        self.ensure_open()?;
        Ok(self.rows.len())
    }

    fn reposition(&mut self, row: i64) -> Result<(), SqlError> {
        self.ensure_open()?;
        let row = checked_row(row, self.rows.len())?;
        self.position = Position::Row(row);
        Ok(())
    }

    fn position(&self) -> Position {
        self.position
    }

    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    fn current_row(&self) -> Result<&[CellValue], SqlError> {
        self.ensure_open()?;
        self.position
            .row()
            .and_then(|row| self.rows.get(row))
            .map(Vec::as_slice)
            .ok_or_else(|| not_on_row(self.position))
    }

    fn close(&mut self) {
        self.rows = Vec::new();
        self.position = Position::BeforeFirst;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn supports_random_access(&self) -> bool {
        true
    }
}
