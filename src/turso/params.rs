use crate::error::SqlError;
use crate::statement::ParamBindings;
use crate::types::{BoundValue, CellValue};

/// Convert a bound value into the turso value it is sent as.
#[must_use]
pub fn bound_to_turso_value(value: &BoundValue) -> turso::Value {
    match value {
        BoundValue::Null => turso::Value::Null,
        BoundValue::Int(i) => turso::Value::Integer(i64::from(*i)),
        BoundValue::Long(i) => turso::Value::Integer(*i),
        BoundValue::Float(f) => turso::Value::Real(f64::from(*f)),
        BoundValue::Double(f) => turso::Value::Real(*f),
        BoundValue::Text(s) => turso::Value::Text(s.clone()),
        BoundValue::Bytes(b) => turso::Value::Blob(b.clone()),
    }
}

#[must_use]
pub fn cell_from_turso_value(value: turso::Value) -> CellValue {
    match value {
        turso::Value::Null => CellValue::Null,
        turso::Value::Integer(i) => CellValue::Integer(i),
        turso::Value::Real(f) => CellValue::Real(f),
        turso::Value::Text(s) => CellValue::Text(s),
        turso::Value::Blob(b) => CellValue::Blob(b),
    }
}

/// One positional value per placeholder, NULL where nothing was bound.
pub(crate) fn positional_params(
    bindings: &ParamBindings,
    placeholders: usize,
) -> Result<turso::params::Params, SqlError> {
    let values = bindings
        .positional(placeholders)?
        .iter()
        .map(bound_to_turso_value)
        .collect();
    Ok(turso::params::Params::Positional(values))
}
