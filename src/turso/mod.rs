// Turso backend - in-process SQLite-compatible engine
//
// Turso's API is async; each connection owns a current-thread tokio runtime
// and blocks on it, so callers see the same synchronous contract as SQLite.
//
// - config: file location
// - params: conversion between bound/cell values and turso values
// - query: row sources and the cursor type handed to callers
// - prepared: statements compiled on first execution
// - connection: the `Database` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;

pub use config::TursoOptions;
pub use connection::TursoDatabase;
pub use prepared::TursoPreparedStatement;
pub use query::{TursoCursor, TursoRows};

/// Native handles of an open turso database.
pub(crate) struct TursoSession {
    _database: turso::Database,
    pub(crate) conn: turso::Connection,
}

impl std::fmt::Debug for TursoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoSession")
            .field("_database", &"<turso::Database>")
            .field("conn", &"<turso::Connection>")
            .finish()
    }
}
