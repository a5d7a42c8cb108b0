use rusqlite::{Rows, Statement};

use crate::cursor::{BufferedCursor, ColumnMap, RowSource};
use crate::database::ConnectionId;
use crate::error::{SqlError, from_sqlite};
use crate::statement::ParamBindings;
use crate::types::CellValue;

use super::params::{bind_all, cell_from_sqlite_ref};

/// A stepping rusqlite result. Dropping the rows resets the statement.
pub(crate) struct SqliteRows<'s> {
    rows: Rows<'s>,
    width: usize,
}

impl RowSource for SqliteRows<'_> {
    fn fetch(&mut self) -> Result<Option<Vec<CellValue>>, SqlError> {
        let Some(row) = self
            .rows
            .next()
            .map_err(|e| from_sqlite("failed to step result", e))?
        else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.width);
        for idx in 0..self.width {
            let value = row
                .get_ref(idx)
                .map_err(|e| from_sqlite("failed to read column", e))?;
            values.push(cell_from_sqlite_ref(value));
        }
        Ok(Some(values))
    }

    fn release(&mut self) {}
}

pub(crate) fn column_map(stmt: &Statement<'_>) -> ColumnMap {
    ColumnMap::new(
        stmt.column_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    )
}

/// Bind `bindings` and start stepping `stmt`.
pub(crate) fn start<'s>(
    stmt: &'s mut Statement<'_>,
    bindings: &ParamBindings,
) -> Result<(ColumnMap, SqliteRows<'s>), SqlError> {
    bind_all(stmt, bindings)?;
    let columns = column_map(stmt);
    let width = columns.len();
    Ok((
        columns,
        SqliteRows {
            rows: stmt.raw_query(),
            width,
        },
    ))
}

/// Run `stmt` and buffer its whole result.
pub(crate) fn buffered_query(
    origin: ConnectionId,
    stmt: &mut Statement<'_>,
    bindings: &ParamBindings,
) -> Result<BufferedCursor, SqlError> {
    let (columns, rows) = start(stmt, bindings)?;
    BufferedCursor::from_source(origin, columns, rows)
}

/// Run `stmt` into an existing cursor.
pub(crate) fn buffered_requery(
    cursor: &mut BufferedCursor,
    stmt: &mut Statement<'_>,
    bindings: &ParamBindings,
) -> Result<(), SqlError> {
    let (columns, rows) = start(stmt, bindings)?;
    cursor.repopulate_from(columns, rows)
}

/// Step `stmt` to completion, discarding any rows it produces.
pub(crate) fn run_to_end(stmt: &mut Statement<'_>, bindings: &ParamBindings) -> Result<(), SqlError> {
    let (_, mut rows) = start(stmt, bindings)?;
    while rows.fetch()?.is_some() {}
    Ok(())
}
