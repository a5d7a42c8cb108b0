//! Schema versioning through SQLite's `user_version` pragma.
//!
//! A brand-new file (stored version 0) runs the create script. An older file
//! runs the upgrade script once, however many versions behind it is. A newer
//! file is refused. The script and the version bump commit together.

use tracing::debug;

use crate::database::DatabaseSpec;
use crate::error::SqlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    Create,
    Upgrade { from: i64 },
    UpToDate,
}

/// Decide what to do with a file at `stored` when `requested` is wanted.
///
/// # Errors
///
/// Returns `SqlError::ConnectionError` when the file is newer than requested
/// or reports a negative version.
pub fn plan(stored: i64, requested: i64) -> Result<SchemaAction, SqlError> {
    match stored {
        s if s < 0 => Err(SqlError::ConnectionError(format!(
            "stored schema version is negative: {s}"
        ))),
        0 => Ok(SchemaAction::Create),
        s if s < requested => Ok(SchemaAction::Upgrade { from: s }),
        s if s == requested => Ok(SchemaAction::UpToDate),
        s => Err(SqlError::ConnectionError(format!(
            "database schema version {s} is newer than requested version {requested}; downgrade is not supported"
        ))),
    }
}

/// Backend hooks used by [`migrate`].
pub(crate) trait SchemaTarget {
    fn stored_version(&mut self) -> Result<i64, SqlError>;

    /// Run `script` (possibly several statements) and store `version` in one
    /// transaction.
    fn apply_script(&mut self, script: &str, version: i64) -> Result<(), SqlError>;
}

pub(crate) fn migrate<T: SchemaTarget + ?Sized>(
    target: &mut T,
    spec: &DatabaseSpec,
) -> Result<SchemaAction, SqlError> {
    let stored = target.stored_version()?;
    let action = plan(stored, spec.version)?;
    match action {
        SchemaAction::Create => {
            debug!(database = %spec.name, version = spec.version, "creating schema");
            target.apply_script(&spec.create_ddl, spec.version)?;
        }
        SchemaAction::Upgrade { from } => {
            debug!(database = %spec.name, from, to = spec.version, "upgrading schema");
            target.apply_script(&spec.upgrade_ddl, spec.version)?;
        }
        SchemaAction::UpToDate => {
            debug!(database = %spec.name, version = stored, "schema up to date");
        }
    }
    Ok(action)
}
