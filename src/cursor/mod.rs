//! Uniform access to query results.
//!
//! Two strategies sit behind the [`Cursor`] trait:
//! - [`BufferedCursor`] pulls every row into memory when the query runs. Row
//!   count is exact from the start and [`Cursor::reposition`] can jump anywhere.
//! - [`StreamingCursor`] fetches one row per [`Cursor::next`] from the engine.
//!   It only moves forward; [`Cursor::count`] has to fetch the rest of the
//!   result first.
//!
//! Typed getters live on [`CursorExt`], which every cursor (including
//! `dyn Cursor`) implements.

mod buffered;
mod columns;
mod streaming;

pub use buffered::BufferedCursor;
pub use columns::{ColumnIndex, ColumnMap};
pub use streaming::{RowSource, StreamingCursor};

use crate::error::SqlError;
use crate::types::{CellValue, FromCell};

/// Where a cursor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Freshly populated; no row is current.
    BeforeFirst,
    /// On the zero-based row.
    Row(usize),
    /// [`Cursor::next`] has returned `false`.
    AfterLast,
}

impl Position {
    #[must_use]
    pub fn row(self) -> Option<usize> {
        match self {
            Position::Row(row) => Some(row),
            Position::BeforeFirst | Position::AfterLast => None,
        }
    }

    pub(crate) fn advanced(self) -> usize {
        match self {
            Position::BeforeFirst => 0,
            Position::Row(row) => row + 1,
            Position::AfterLast => usize::MAX,
        }
    }
}

/// A result set being read row by row.
///
/// Cursors are not thread-safe by contract and are scoped to the connection
/// that produced them. Once closed, every method except [`Cursor::close`] and
/// [`Cursor::is_closed`] fails with `SqlError::CursorError`.
pub trait Cursor {
    /// Advance to the next row. Returns `false` once the rows are exhausted and
    /// keeps returning `false` until the cursor is re-queried.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the cursor is closed or the engine fails to produce
    /// the next row.
    fn next(&mut self) -> Result<bool, SqlError>;

    /// Total number of rows in the result.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the cursor is closed or the remaining rows cannot be
    /// fetched.
    fn count(&mut self) -> Result<usize, SqlError>;

    /// Move to an absolute zero-based row.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` when `row` is negative or not below
    /// [`Cursor::count`], and `SqlError::Unsupported` when the cursor cannot
    /// move in the requested direction.
    fn reposition(&mut self, row: i64) -> Result<(), SqlError>;

    fn position(&self) -> Position;

    /// Column metadata of the current result.
    fn columns(&self) -> &ColumnMap;

    /// Cells of the current row.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` if the cursor is closed or not on a row.
    fn current_row(&self) -> Result<&[CellValue], SqlError>;

    /// Release the underlying resources. Calling it twice is harmless.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Whether [`Cursor::reposition`] may move backwards.
    fn supports_random_access(&self) -> bool;
}

/// Typed cell reads, available on every [`Cursor`].
pub trait CursorExt: Cursor {
    /// Read the cell at `column` of the current row as `T`.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` if the cursor is not on a row, the column
    /// does not exist, or the cell cannot be converted to `T`.
    fn get<T: FromCell, C: ColumnIndex>(&self, column: C) -> Result<T, SqlError> {
        let row = self.current_row()?;
        let idx = column.column_index(self.columns())?;
        let cell = row.get(idx).ok_or_else(|| {
            SqlError::CursorError(format!("column index out of bounds: {idx}"))
        })?;
        T::from_cell(cell)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn is_null<C: ColumnIndex>(&self, column: C) -> Result<bool, SqlError> {
        self.get::<CellValue, C>(column).map(|cell| cell.is_null())
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_blob<C: ColumnIndex>(&self, column: C) -> Result<Vec<u8>, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_double<C: ColumnIndex>(&self, column: C) -> Result<f64, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_float<C: ColumnIndex>(&self, column: C) -> Result<f32, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_int<C: ColumnIndex>(&self, column: C) -> Result<i32, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_long<C: ColumnIndex>(&self, column: C) -> Result<i64, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_short<C: ColumnIndex>(&self, column: C) -> Result<i16, SqlError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// See [`CursorExt::get`].
    fn get_string<C: ColumnIndex>(&self, column: C) -> Result<String, SqlError> {
        self.get(column)
    }
}

impl<T: Cursor + ?Sized> CursorExt for T {}

pub(crate) fn not_on_row(position: Position) -> SqlError {
    SqlError::CursorError(format!("cursor not on a valid row ({position:?})"))
}

/// Validate a requested row against a known row count.
pub(crate) fn checked_row(row: i64, count: usize) -> Result<usize, SqlError> {
    usize::try_from(row)
        .ok()
        .filter(|&r| r < count)
        .ok_or_else(|| {
            SqlError::CursorError(format!("row index out of bounds: {row} (count={count})"))
        })
}
