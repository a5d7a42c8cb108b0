// SQLite backend - bundled SQLite through rusqlite
//
// - config: where the file lives and how long to wait on locks
// - params: conversion between bound/cell values and rusqlite values
// - query: stepping rusqlite results into buffered cursors
// - prepared: lazily compiled statements kept in rusqlite's statement cache
// - connection: the `Database` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;

pub use config::SqliteOptions;
pub use connection::SqliteDatabase;
pub use prepared::SqlitePreparedStatement;
