//! Prepared statements and their parameter bindings.

use std::collections::BTreeMap;
use std::io::Read;

use crate::cursor::Cursor;
use crate::error::SqlError;
use crate::types::BoundValue;

/// 1-based placeholder index → bound value.
///
/// Values stay bound across executions until they are overwritten, cleared,
/// or the statement is closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBindings {
    values: BTreeMap<usize, BoundValue>,
}

impl ParamBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` at `index`, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::BindingError` when `index` is 0.
    pub fn set(&mut self, index: usize, value: BoundValue) -> Result<(), SqlError> {
        if index == 0 {
            return Err(SqlError::BindingError(
                "parameter indices start at 1".into(),
            ));
        }
        self.values.insert(index, value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BoundValue> {
        self.values.get(&index)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest bound index, or 0 when nothing is bound.
    #[must_use]
    pub fn highest_index(&self) -> usize {
        self.values.keys().next_back().copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BoundValue)> {
        self.values.iter().map(|(idx, value)| (*idx, value))
    }

    /// Check every bound index against the compiled statement.
    pub(crate) fn check_against(&self, placeholders: usize) -> Result<(), SqlError> {
        let highest = self.highest_index();
        if highest > placeholders {
            return Err(SqlError::BindingError(format!(
                "parameter index {highest} out of range (statement has {placeholders} placeholders)"
            )));
        }
        Ok(())
    }

    /// One value per placeholder, NULL where nothing was bound.
    pub(crate) fn positional(&self, placeholders: usize) -> Result<Vec<BoundValue>, SqlError> {
        self.check_against(placeholders)?;
        Ok((1..=placeholders)
            .map(|idx| self.values.get(&idx).cloned().unwrap_or(BoundValue::Null))
            .collect())
    }
}

/// A compiled, reusable, parameterized statement.
///
/// The SQL is compiled by the first `execute*` call and the compiled form is
/// reused until [`PreparedStatement::close`]. Setters only record values, so
/// binding never touches the engine.
pub trait PreparedStatement {
    type Cursor: Cursor;

    fn sql(&self) -> &str;

    fn is_compiled(&self) -> bool;

    fn is_closed(&self) -> bool;

    fn bindings(&self) -> &ParamBindings;

    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` once the statement is closed.
    fn bindings_mut(&mut self) -> Result<&mut ParamBindings, SqlError>;

    /// Bind any value convertible to a [`BoundValue`].
    ///
    /// # Errors
    ///
    /// Returns `SqlError::BindingError` for index 0 and
    /// `SqlError::ExecutionError` once the statement is closed.
    fn bind(&mut self, index: usize, value: impl Into<BoundValue>) -> Result<(), SqlError>
    where
        Self: Sized,
    {
        self.bindings_mut()?.set(index, value.into())
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_null(&mut self, index: usize) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Null)
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_int(&mut self, index: usize, value: i32) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Int(value))
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_long(&mut self, index: usize, value: i64) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Long(value))
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_float(&mut self, index: usize, value: f32) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Float(value))
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_double(&mut self, index: usize, value: f64) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Double(value))
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_string(&mut self, index: usize, value: &str) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Text(value.to_owned()))
    }

    /// # Errors
    ///
    /// See [`PreparedStatement::bind`].
    fn set_blob(&mut self, index: usize, value: &[u8]) -> Result<(), SqlError> {
        self.bindings_mut()?.set(index, BoundValue::Bytes(value.to_vec()))
    }

    /// Read `reader` to the end and bind the bytes as a blob.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::BindingError` if reading fails, otherwise as
    /// [`PreparedStatement::bind`].
    fn set_blob_from_reader(&mut self, index: usize, reader: &mut dyn Read) -> Result<(), SqlError> {
        let bindings = self.bindings_mut()?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|err| {
            SqlError::BindingError(format!("failed to read blob for parameter {index}: {err}"))
        })?;
        bindings.set(index, BoundValue::Bytes(bytes))
    }

    /// Forget every bound value. The compiled statement is kept.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ExecutionError` once the statement is closed.
    fn clear_parameters(&mut self) -> Result<(), SqlError> {
        self.bindings_mut()?.clear();
        Ok(())
    }

    /// Run a statement whose result is not needed.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::BindingError` when a bound index exceeds the
    /// statement's placeholders, `SqlError::ExecutionError` for SQL or
    /// constraint failures and `SqlError::ConnectionError` once the owning
    /// connection is closed.
    fn execute(&mut self) -> Result<(), SqlError>;

    /// Run an INSERT and return the new row id, or `-1` when no row was
    /// inserted.
    ///
    /// # Errors
    ///
    /// See [`PreparedStatement::execute`].
    fn execute_insert(&mut self) -> Result<i64, SqlError>;

    /// Run an UPDATE or DELETE and return the number of affected rows.
    ///
    /// # Errors
    ///
    /// See [`PreparedStatement::execute`].
    fn execute_update_delete(&mut self) -> Result<u64, SqlError>;

    /// Run a query and return a cursor over its rows.
    ///
    /// # Errors
    ///
    /// See [`PreparedStatement::execute`].
    fn execute_query(&mut self) -> Result<Self::Cursor, SqlError>;

    /// Release the compiled statement and drop the bindings. Calling it twice
    /// is harmless.
    fn close(&mut self);
}

pub(crate) fn statement_closed() -> SqlError {
    SqlError::ExecutionError("statement is closed".into())
}
