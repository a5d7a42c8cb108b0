//! Convenient imports for common functionality.
//!
//! Bringing the traits into scope is what makes `next`, `get_string`,
//! `set_int` and friends callable on connections, cursors and statements.

pub use crate::config::HostConfig;
pub use crate::cursor::{Cursor, CursorExt, Position};
pub use crate::database::{ConnectionState, Database};
pub use crate::error::{ErrorKind, SqlError};
pub use crate::manager::{AnyCursor, AnyDatabase, AnyStatement, DatabaseManager};
pub use crate::statement::PreparedStatement;
pub use crate::types::{Backend, BoundValue, CellValue, CursorMode};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDatabase, SqliteOptions, SqlitePreparedStatement};
#[cfg(feature = "turso")]
pub use crate::turso::{TursoCursor, TursoDatabase, TursoOptions, TursoPreparedStatement};
