use std::collections::VecDeque;

use crate::database::ConnectionId;
use crate::error::SqlError;
use crate::types::CellValue;

use super::{ColumnMap, Cursor, Position, checked_row, not_on_row};

/// A native result handle that yields one row at a time.
pub trait RowSource {
    /// Fetch the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` when the engine fails while stepping.
    fn fetch(&mut self) -> Result<Option<Vec<CellValue>>, SqlError>;

    /// Free the native result. Called at most once per source.
    fn release(&mut self);
}

/// Forward-only cursor that reads rows from the engine as it advances.
///
/// Only the current row is held in memory. `count` must fetch every remaining
/// row to answer and keeps them queued so iteration still sees them.
/// `reposition` may skip forward; moving backwards is unsupported.
pub struct StreamingCursor<S: RowSource> {
    origin: ConnectionId,
    columns: ColumnMap,
    source: Option<S>,
    current: Option<Vec<CellValue>>,
    queued: VecDeque<Vec<CellValue>>,
    fetched: usize,
    position: Position,
    closed: bool,
}

impl<S: RowSource> StreamingCursor<S> {
    pub(crate) fn new(origin: ConnectionId, columns: ColumnMap, source: S) -> Self {
        Self {
            origin,
            columns,
            source: Some(source),
            current: None,
            queued: VecDeque::new(),
            fetched: 0,
            position: Position::BeforeFirst,
            closed: false,
        }
    }

    /// Swap in a new result, releasing the old one.
    pub(crate) fn repopulate(&mut self, columns: ColumnMap, source: S) {
        self.release_source();
        self.columns = columns;
        self.source = Some(source);
        self.current = None;
        self.queued.clear();
        self.fetched = 0;
        self.position = Position::BeforeFirst;
        self.closed = false;
    }

    pub(crate) fn origin(&self) -> ConnectionId {
        self.origin
    }

    /// Whether the engine has reported the end of the result.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.source.is_none()
    }

    fn pull(&mut self) -> Result<Option<Vec<CellValue>>, SqlError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        match source.fetch()? {
            Some(row) => {
                self.fetched += 1;
                Ok(Some(row))
            }
            None => {
                self.release_source();
                Ok(None)
            }
        }
    }

    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }

    fn ensure_open(&self) -> Result<(), SqlError> {
        if self.closed {
            Err(SqlError::cursor_closed())
        } else {
            Ok(())
        }
    }
}

impl<S: RowSource> Cursor for StreamingCursor<S> {
    fn next(&mut self) -> Result<bool, SqlError> {
        self.ensure_open()?;
        if self.position == Position::AfterLast {
            return Ok(false);
        }
        let row = match self.queued.pop_front() {
            Some(row) => Some(row),
            None => self.pull()?,
        };
        match row {
            Some(row) => {
                self.position = Position::Row(self.position.advanced());
                self.current = Some(row);
                Ok(true)
            }
            None => {
                self.position = Position::AfterLast;
                self.current = None;
                Ok(false)
            }
        }
    }

    fn count(&mut self) -> Result<usize, SqlError> {
        self.ensure_open()?;
        while let Some(row) = self.pull()? {
            self.queued.push_back(row);
        }
        Ok(self.fetched)
    }

    fn reposition(&mut self, row: i64) -> Result<(), SqlError> {
        self.ensure_open()?;
        let total = self.count()?;
        let target = checked_row(row, total)?;
        let current = match self.position {
            Position::BeforeFirst => None,
            Position::Row(r) => Some(r),
            Position::AfterLast => Some(total),
        };
        if current == Some(target) {
            return Ok(());
        }
        if current.is_some_and(|r| r > target) {
            return Err(SqlError::Unsupported(format!(
                "streaming cursor cannot move backwards from {current:?} to row {target}"
            )));
        }
        while self.position != Position::Row(target) {
            if !self.next()? {
                return Err(SqlError::CursorError(format!(
                    "row index out of bounds: {target}"
                )));
            }
        }
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
        self.current
            .as_deref()
            .ok_or_else(|| not_on_row(self.position))
    }

    fn close(&mut self) {
        self.release_source();
        self.current = None;
        self.queued.clear();
        self.position = Position::BeforeFirst;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn supports_random_access(&self) -> bool {
        false
    }
}

impl<S: RowSource> Drop for StreamingCursor<S> {
    fn drop(&mut self) {
        self.release_source();
    }
}

impl<S: RowSource> std::fmt::Debug for StreamingCursor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCursor")
            .field("origin", &self.origin)
            .field("columns", &self.columns.names())
            .field("fetched", &self.fetched)
            .field("position", &self.position)
            .field("exhausted", &self.source.is_none())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::cursor::CursorExt;

    struct VecSource {
        rows: std::vec::IntoIter<Vec<CellValue>>,
        pulls: Rc<Cell<usize>>,
        released: Rc<Cell<bool>>,
    }

    impl RowSource for VecSource {
        fn fetch(&mut self) -> Result<Option<Vec<CellValue>>, SqlError> {
            self.pulls.set(self.pulls.get() + 1);
            Ok(self.rows.next())
        }

        fn release(&mut self) {
            self.released.set(true);
        }
    }

    fn cursor(n: i64) -> (StreamingCursor<VecSource>, Rc<Cell<usize>>, Rc<Cell<bool>>) {
        let pulls = Rc::new(Cell::new(0));
        let released = Rc::new(Cell::new(false));
        let rows = (1..=n).map(|i| vec![CellValue::Integer(i)]).collect::<Vec<_>>();
        let source = VecSource {
            rows: rows.into_iter(),
            pulls: Rc::clone(&pulls),
            released: Rc::clone(&released),
        };
        let c = StreamingCursor::new(ConnectionId::next(), ColumnMap::new(vec!["n".into()]), source);
        (c, pulls, released)
    }

    #[test]
    fn fetches_lazily() {
        let (mut c, pulls, released) = cursor(3);
        assert_eq!(pulls.get(), 0);
        assert!(c.next().unwrap());
        assert_eq!(pulls.get(), 1);
        assert_eq!(c.get_long("N").unwrap(), 1);
        assert!(c.next().unwrap());
        assert!(c.next().unwrap());
        assert!(!released.get());
        assert!(!c.next().unwrap());
        assert!(released.get());
        assert!(!c.next().unwrap());
        assert!(c.get_long(0_usize).is_err());
    }

    #[test]
    fn count_drains_but_keeps_rows() {
        let (mut c, _, released) = cursor(4);
        assert!(c.next().unwrap());
        assert_eq!(c.count().unwrap(), 4);
        assert!(released.get());
        let mut seen = vec![c.get_long(0_usize).unwrap()];
        while c.next().unwrap() {
            seen.push(c.get_long(0_usize).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(c.count().unwrap(), 4);
    }

    #[test]
    fn reposition_moves_forward_only() {
        let (mut c, _, _) = cursor(5);
        c.reposition(2).unwrap();
        assert_eq!(c.get_long(0_usize).unwrap(), 3);
        c.reposition(2).unwrap();
        assert_eq!(c.get_long(0_usize).unwrap(), 3);
        assert!(matches!(c.reposition(1), Err(SqlError::Unsupported(_))));
        assert!(matches!(c.reposition(5), Err(SqlError::CursorError(_))));
        assert!(matches!(c.reposition(-1), Err(SqlError::CursorError(_))));
        c.reposition(4).unwrap();
        assert_eq!(c.get_long(0_usize).unwrap(), 5);
    }

    #[test]
    fn close_releases_source() {
        let (mut c, _, released) = cursor(2);
        c.next().unwrap();
        c.close();
        assert!(released.get());
        assert!(c.is_closed());
        assert!(matches!(c.next(), Err(SqlError::CursorError(_))));
        c.close();
    }

    #[test]
    fn repopulate_starts_over() {
        let (mut c, _, first_released) = cursor(2);
        while c.next().unwrap() {}
        c.close();
        let released = Rc::new(Cell::new(false));
        let source = VecSource {
            rows: vec![vec![CellValue::Text("x".into()), CellValue::Null]].into_iter(),
            pulls: Rc::new(Cell::new(0)),
            released: Rc::clone(&released),
        };
        c.repopulate(ColumnMap::new(vec!["a".into(), "b".into()]), source);
        assert!(first_released.get());
        assert!(!c.is_closed());
        assert_eq!(c.position(), Position::BeforeFirst);
        assert!(c.next().unwrap());
        assert_eq!(c.get_string("A").unwrap(), "x");
        assert!(c.is_null(1_usize).unwrap());
        assert!(!c.next().unwrap());
        assert!(released.get());
    }
}
