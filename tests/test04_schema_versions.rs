#![cfg(feature = "sqlite")]

use std::path::Path;

use portable_sql::DatabaseSpec;
use portable_sql::prelude::*;

const CREATE_V1: &str = "
    CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
    INSERT INTO notes (body) VALUES ('seed');
";

const UPGRADE: &str = "
    ALTER TABLE notes ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0;
    CREATE TABLE upgrades (id INTEGER PRIMARY KEY);
    INSERT INTO upgrades DEFAULT VALUES;
";

fn open(path: &Path, version: i64, create: &str, upgrade: &str) -> Result<SqliteDatabase, SqlError> {
    let mut db = SqliteDatabase::new(
        DatabaseSpec::new("notes.db", version, create, upgrade),
        SqliteOptions::new(path),
    );
    db.setup_database()?;
    db.open_or_create_database()?;
    Ok(db)
}

fn scalar(db: &mut SqliteDatabase, sql: &str) -> Result<i64, SqlError> {
    let mut cursor = db.raw_query(sql)?;
    assert!(cursor.next()?);
    cursor.get_long(0_usize)
}

#[test]
fn create_runs_once_for_a_new_file() -> Result<(), SqlError> {
    let dir = tempfile::tempdir().map_err(|e| SqlError::ConfigError(e.to_string()))?;
    let path = dir.path().join("notes.db");

    let mut db = open(&path, 1, CREATE_V1, UPGRADE)?;
    assert_eq!(scalar(&mut db, "PRAGMA user_version")?, 1);
    assert_eq!(scalar(&mut db, "SELECT count(*) FROM notes")?, 1);
    db.close_database()?;

    let mut db = open(&path, 1, CREATE_V1, UPGRADE)?;
    assert_eq!(scalar(&mut db, "SELECT count(*) FROM notes")?, 1);
    Ok(())
}

#[test]
fn upgrade_runs_once_however_far_behind() -> Result<(), SqlError> {
    let dir = tempfile::tempdir().map_err(|e| SqlError::ConfigError(e.to_string()))?;
    let path = dir.path().join("notes.db");
    open(&path, 1, CREATE_V1, UPGRADE)?.close_database()?;

    let mut db = open(&path, 4, CREATE_V1, UPGRADE)?;
    assert_eq!(scalar(&mut db, "PRAGMA user_version")?, 4);
    assert_eq!(scalar(&mut db, "SELECT count(*) FROM upgrades")?, 1);
    assert_eq!(scalar(&mut db, "SELECT pinned FROM notes")?, 0);
    db.close_database()?;

    let mut db = open(&path, 4, CREATE_V1, UPGRADE)?;
    assert_eq!(scalar(&mut db, "SELECT count(*) FROM upgrades")?, 1);
    Ok(())
}

#[test]
fn downgrade_is_refused() -> Result<(), SqlError> {
    let dir = tempfile::tempdir().map_err(|e| SqlError::ConfigError(e.to_string()))?;
    let path = dir.path().join("notes.db");
    open(&path, 3, CREATE_V1, UPGRADE)?.close_database()?;

    let mut db = SqliteDatabase::new(
        DatabaseSpec::new("notes.db", 2, CREATE_V1, UPGRADE),
        SqliteOptions::new(&path),
    );
    db.setup_database()?;
    assert!(matches!(
        db.open_or_create_database(),
        Err(SqlError::ConnectionError(msg)) if msg.contains("newer")
    ));
    assert_eq!(db.state(), ConnectionState::SetUp);
    Ok(())
}

#[test]
fn failed_upgrade_changes_nothing() -> Result<(), SqlError> {
    let dir = tempfile::tempdir().map_err(|e| SqlError::ConfigError(e.to_string()))?;
    let path = dir.path().join("notes.db");
    open(&path, 1, CREATE_V1, UPGRADE)?.close_database()?;

    let broken = "CREATE TABLE half (id INTEGER); THIS IS NOT SQL;";
    let mut db = SqliteDatabase::new(
        DatabaseSpec::new("notes.db", 2, CREATE_V1, broken),
        SqliteOptions::new(&path),
    );
    db.setup_database()?;
    assert!(db.open_or_create_database().is_err());

    let mut db = open(&path, 1, CREATE_V1, UPGRADE)?;
    assert_eq!(scalar(&mut db, "PRAGMA user_version")?, 1);
    assert_eq!(
        scalar(&mut db, "SELECT count(*) FROM sqlite_master WHERE name = 'half'")?,
        0
    );
    Ok(())
}

#[test]
fn manager_resolves_names_in_the_data_dir() -> Result<(), SqlError> {
    let dir = tempfile::tempdir().map_err(|e| SqlError::ConfigError(e.to_string()))?;
    let manager = DatabaseManager::new(
        HostConfig::builder()
            .data_dir(dir.path())
            .backend(Backend::Sqlite)
            .finish(),
    );
    let mut db = manager.get_new_database("notes.db", 1, CREATE_V1, UPGRADE)?;
    db.setup_database()?;
    db.open_or_create_database()?;
    db.close_database()?;
    assert!(dir.path().join("notes.db").exists());
    Ok(())
}
