//! One synchronous SQL API over the embedded engine each host provides.
//!
//! A [`DatabaseManager`] chooses the backend for the host and builds
//! connections. A connection is set up, opened (creating or upgrading its
//! schema), then queried through raw SQL or [`PreparedStatement`]s, and every
//! query result is read through the [`Cursor`] trait whether the backend
//! buffers it or streams it.
//!
//! ```no_run
//! use portable_sql::prelude::*;
//!
//! # fn main() -> Result<(), SqlError> {
//! let manager = DatabaseManager::for_host();
//! let mut db = manager.get_new_database(
//!     "notes.db",
//!     1,
//!     "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
//!     "",
//! )?;
//! db.setup_database()?;
//! db.open_or_create_database()?;
//!
//! let mut insert = db.get_prepared_statement("INSERT INTO notes (body) VALUES (?)")?;
//! insert.set_string(1, "hello")?;
//! let id = insert.execute_insert()?;
//! insert.close();
//!
//! let mut cursor = db.raw_query("SELECT id, body FROM notes")?;
//! while cursor.next()? {
//!     assert_eq!(cursor.get_long("id")?, id);
//!     println!("{}", cursor.get_string("BODY")?);
//! }
//! cursor.close();
//! db.close_database()?;
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "turso")))]
compile_error!("enable at least one backend feature: `sqlite` or `turso`");

pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod schema;
pub mod sql_text;
pub mod statement;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "turso")]
pub mod turso;

pub use config::{HostConfig, HostConfigBuilder};
pub use cursor::{BufferedCursor, ColumnIndex, ColumnMap, Cursor, CursorExt, Position, StreamingCursor};
pub use database::{ConnectionId, ConnectionState, Database, DatabaseSpec, TransactionState};
pub use error::{ErrorKind, SqlError};
pub use manager::{AnyCursor, AnyDatabase, AnyStatement, DatabaseManager};
pub use statement::{ParamBindings, PreparedStatement};
pub use types::{Backend, BoundValue, CellValue, CursorMode, FromCell};
