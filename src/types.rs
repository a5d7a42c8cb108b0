use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlError;

/// A single cell read from a result row.
///
/// The variants are the `SQLite` storage classes; both backends report values in
/// these terms.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Storage class name, used in conversion diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "NULL",
            CellValue::Integer(_) => "INTEGER",
            CellValue::Real(_) => "REAL",
            CellValue::Text(_) => "TEXT",
            CellValue::Blob(_) => "BLOB",
        }
    }
}

/// A value bound to a prepared statement placeholder.
///
/// Every setter on [`crate::PreparedStatement`] produces one of these, so the
/// type of a binding is known up to the point where the backend hands it to the
/// engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i32> for BoundValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for BoundValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for BoundValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for BoundValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for BoundValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for BoundValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&[u8]> for BoundValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for BoundValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<BoundValue>> From<Option<T>> for BoundValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// The native engine behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Bundled `SQLite` through `rusqlite`; results are buffered.
    Sqlite,
    /// Turso, the in-process SQLite-compatible engine; results stream.
    Turso,
}

impl Backend {
    /// The backend a host of this kind gets when the configuration names none.
    ///
    /// Mobile targets prefer Turso when it is compiled in; everything else uses
    /// `SQLite`.
    #[must_use]
    pub fn for_current_platform() -> Self {
        if cfg!(all(
            feature = "turso",
            any(target_os = "android", target_os = "ios")
        )) || cfg!(not(feature = "sqlite"))
        {
            Backend::Turso
        } else {
            Backend::Sqlite
        }
    }

    #[must_use]
    pub fn is_compiled_in(self) -> bool {
        match self {
            Backend::Sqlite => cfg!(feature = "sqlite"),
            Backend::Turso => cfg!(feature = "turso"),
        }
    }
}

/// How a query result is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// Use the backend's native strategy.
    #[default]
    Native,
    /// Pull every row into memory when the query runs.
    Buffered,
    /// Fetch rows one at a time as the cursor advances.
    Streaming,
}

/// Conversion from a [`CellValue`] into a Rust type.
///
/// Numeric reads widen (an INTEGER read as `f64` is promoted) but never parse
/// text. Narrowing integer reads are range checked.
pub trait FromCell: Sized {
    /// # Errors
    ///
    /// Returns `SqlError::CursorError` when the cell cannot be represented as `Self`.
    fn from_cell(value: &CellValue) -> Result<Self, SqlError>;
}

fn mismatch(value: &CellValue, target: &str) -> SqlError {
    if value.is_null() {
        SqlError::CursorError(format!("cannot read NULL as {target}"))
    } else {
        SqlError::CursorError(format!(
            "cannot read {} value as {target}",
            value.type_name()
        ))
    }
}

macro_rules! impl_from_cell_integer {
    ($($ty:ty),*) => {
        $(
            impl FromCell for $ty {
                fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
                    match value {
                        CellValue::Integer(i) => <$ty>::try_from(*i).map_err(|_| {
                            SqlError::CursorError(format!(
                                "integer {i} does not fit in {}",
                                stringify!($ty)
                            ))
                        }),
                        other => Err(mismatch(other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

impl_from_cell_integer!(i16, i32, i64);

impl FromCell for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        match value {
            CellValue::Real(f) => Ok(*f),
            CellValue::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl FromCell for f32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        match value {
            CellValue::Real(f) => Ok(*f as f32),
            CellValue::Integer(i) => Ok(*i as f32),
            other => Err(mismatch(other, "f32")),
        }
    }
}

impl FromCell for String {
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        match value {
            CellValue::Text(s) => Ok(s.clone()),
            CellValue::Integer(i) => Ok(i.to_string()),
            CellValue::Real(f) => Ok(f.to_string()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl FromCell for Vec<u8> {
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        match value {
            CellValue::Blob(b) => Ok(b.clone()),
            CellValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(other, "Vec<u8>")),
        }
    }
}

impl FromCell for CellValue {
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        Ok(value.clone())
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(value: &CellValue) -> Result<Self, SqlError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_cell(value).map(Some)
        }
    }
}
