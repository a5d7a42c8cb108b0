use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SqlError;

/// Column names of a result set plus a case-insensitive name lookup.
///
/// Built once per query from the statement metadata. When a result carries two
/// columns with the same name the first one wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    names: Arc<Vec<String>>,
    lookup: HashMap<String, usize>,
}

impl ColumnMap {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut lookup = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            lookup.entry(name.to_ascii_lowercase()).or_insert(idx);
        }
        Self {
            names: Arc::new(names),
            lookup,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Zero-based index of `name`, ignoring ASCII case.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        if let Some(&idx) = self.lookup.get(name) {
            return Some(idx);
        }
        self.lookup.get(&name.to_ascii_lowercase()).copied()
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<usize, SqlError> {
        self.index_of(name).ok_or_else(|| {
            SqlError::CursorError(format!(
                "column not found: {name} (available: {})",
                self.names.join(", ")
            ))
        })
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<usize, SqlError> {
        if index < self.names.len() {
            Ok(index)
        } else {
            Err(SqlError::CursorError(format!(
                "column index out of bounds: {index} (count={})",
                self.names.len()
            )))
        }
    }
}

/// Anything that can address a column: a zero-based `usize` or a column name.
pub trait ColumnIndex {
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` when the column does not exist.
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlError>;
}

impl ColumnIndex for usize {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlError> {
        columns.check_index(*self)
    }
}

impl ColumnIndex for &str {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlError> {
        columns.resolve(self)
    }
}

impl ColumnIndex for String {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlError> {
        columns.resolve(self)
    }
}

impl ColumnIndex for &String {
    fn column_index(&self, columns: &ColumnMap) -> Result<usize, SqlError> {
        columns.resolve(self)
    }
}
