use rusqlite::Statement;
use rusqlite::types::{Value, ValueRef};

use crate::error::{SqlError, from_sqlite};
use crate::statement::ParamBindings;
use crate::types::{BoundValue, CellValue};

/// Convert a bound value into the rusqlite value it is sent as.
#[must_use]
pub fn bound_to_sqlite_value(value: &BoundValue) -> Value {
    match value {
        BoundValue::Null => Value::Null,
        BoundValue::Int(i) => Value::Integer(i64::from(*i)),
        BoundValue::Long(i) => Value::Integer(*i),
        BoundValue::Float(f) => Value::Real(f64::from(*f)),
        BoundValue::Double(f) => Value::Real(*f),
        BoundValue::Text(s) => Value::Text(s.clone()),
        BoundValue::Bytes(b) => Value::Blob(b.clone()),
    }
}

/// Copy a borrowed column value out of a rusqlite row.
#[must_use]
pub fn cell_from_sqlite_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

/// Bind every placeholder of `stmt`, NULL where nothing was bound.
pub(crate) fn bind_all(stmt: &mut Statement<'_>, bindings: &ParamBindings) -> Result<(), SqlError> {
    let values = bindings.positional(stmt.parameter_count())?;
    for (idx, value) in values.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, bound_to_sqlite_value(value))
            .map_err(|e| from_sqlite(&format!("failed to bind parameter {}", idx + 1), e))?;
    }
    Ok(())
}
