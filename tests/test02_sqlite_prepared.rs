#![cfg(feature = "sqlite")]

use std::io::{self, Cursor as ByteReader, Read};

use portable_sql::DatabaseSpec;
use portable_sql::prelude::*;

const CREATE: &str =
    "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, age INTEGER, score REAL, photo BLOB)";

fn open_memory() -> Result<SqliteDatabase, SqlError> {
    let mut db = SqliteDatabase::new(
        DatabaseSpec::new(":memory:", 1, CREATE, ""),
        SqliteOptions::new(":memory:"),
    );
    db.setup_database()?;
    db.open_or_create_database()?;
    Ok(db)
}

#[test]
fn compiles_lazily_and_reuses() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("INSERT INTO people (name, age) VALUES (?, ?)")?;
    assert!(!stmt.is_compiled());
    assert_eq!(stmt.sql(), "INSERT INTO people (name, age) VALUES (?, ?)");

    for (name, age) in [("ann", 31), ("bob", 42), ("cy", 27)] {
        stmt.set_string(1, name)?;
        stmt.set_int(2, age)?;
        let id = stmt.execute_insert()?;
        assert!(id > 0);
        assert!(stmt.is_compiled());
    }
    assert_eq!(stmt.placeholder_count(), Some(2));
    stmt.close();

    let mut cursor = db.raw_query("SELECT count(*) AS n FROM people")?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get_long("n")?, 3);
    Ok(())
}

#[test]
fn malformed_sql_fails_on_first_execute() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("SELEC nonsense")?;
    assert!(matches!(stmt.execute(), Err(SqlError::ExecutionError(_))));
    assert!(!stmt.is_compiled());
    Ok(())
}

#[test]
fn insert_returns_row_id_and_matches_last_row_id() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    assert_eq!(db.get_last_row_id()?, -1);
    let mut stmt = db.get_prepared_statement("INSERT INTO people (name) VALUES (?)")?;
    stmt.set_string(1, "dee")?;
    let id = stmt.execute_insert()?;
    assert_eq!(db.get_last_row_id()?, id);

    let mut none = db.get_prepared_statement("INSERT INTO people (name) SELECT name FROM people WHERE 0")?;
    assert_eq!(none.execute_insert()?, -1);
    Ok(())
}

#[test]
fn update_delete_reports_affected_rows() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    db.exec_sql("INSERT INTO people (name, age) VALUES ('a', 10), ('b', 20), ('c', 30)")?;
    let mut update = db.get_prepared_statement("UPDATE people SET age = age + 1 WHERE age >= ?")?;
    update.set_long(1, 20)?;
    assert_eq!(update.execute_update_delete()?, 2);

    let mut delete = db.get_prepared_statement("DELETE FROM people WHERE name = ?")?;
    delete.set_string(1, "zzz")?;
    assert_eq!(delete.execute_update_delete()?, 0);
    delete.set_string(1, "a")?;
    assert_eq!(delete.execute_update_delete()?, 1);
    Ok(())
}

#[test]
fn every_bound_type_round_trips_through_the_engine() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut insert = db.get_prepared_statement(
        "INSERT INTO people (name, age, score, photo) VALUES (?1, ?2, ?3, ?4)",
    )?;
    insert.set_string(1, "eve")?;
    insert.set_long(2, 9_000_000_000)?;
    insert.set_float(3, 0.25)?;
    insert.set_blob(4, &[0xde, 0xad])?;
    insert.execute()?;

    insert.set_null(1)?;
    insert.set_int(2, -1)?;
    insert.set_double(3, 2.5)?;
    let mut reader = ByteReader::new(vec![7_u8, 8, 9]);
    insert.set_blob_from_reader(4, &mut reader)?;
    insert.execute()?;

    let mut query = db.get_prepared_statement("SELECT * FROM people ORDER BY id")?;
    let mut cursor = query.execute_query()?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get_string("name")?, "eve");
    assert_eq!(cursor.get_long("age")?, 9_000_000_000);
    assert!(matches!(cursor.get_int("age"), Err(SqlError::CursorError(_))));
    assert!((cursor.get_double("score")? - 0.25).abs() < f64::EPSILON);
    assert_eq!(cursor.get_blob("photo")?, vec![0xde, 0xad]);
    assert!(cursor.next()?);
    assert!(cursor.is_null("name")?);
    assert_eq!(cursor.get_short("age")?, -1);
    assert_eq!(cursor.get_blob("photo")?, vec![7, 8, 9]);
    Ok(())
}

#[test]
fn bindings_persist_until_cleared() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut insert = db.get_prepared_statement("INSERT INTO people (name, age) VALUES (?, ?)")?;
    insert.set_string(1, "same")?;
    insert.set_int(2, 5)?;
    insert.execute()?;
    insert.execute()?;
    insert.clear_parameters()?;
    assert!(insert.bindings().is_empty());
    insert.execute()?;
    assert!(insert.is_compiled());

    let mut cursor = db.raw_query("SELECT name, age FROM people ORDER BY id")?;
    assert_eq!(cursor.count()?, 3);
    cursor.reposition(2)?;
    assert!(cursor.is_null("name")?);
    assert!(cursor.is_null("age")?);
    Ok(())
}

#[test]
fn clear_parameters_before_compiling_is_safe() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("SELECT ?")?;
    stmt.clear_parameters()?;
    assert!(!stmt.is_compiled());
    Ok(())
}

#[test]
fn binding_indices_are_checked() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("SELECT ? AS a")?;
    assert!(matches!(stmt.set_int(0, 1), Err(SqlError::BindingError(_))));
    stmt.set_int(2, 1)?;
    assert!(matches!(stmt.execute_query(), Err(SqlError::BindingError(_))));
    stmt.clear_parameters()?;
    stmt.bind(1, "x")?;
    let mut cursor = stmt.execute_query()?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get_string("a")?, "x");
    Ok(())
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("disk on fire"))
    }
}

#[test]
fn reader_failure_is_a_binding_error() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("INSERT INTO people (photo) VALUES (?)")?;
    assert!(matches!(
        stmt.set_blob_from_reader(1, &mut FailingReader),
        Err(SqlError::BindingError(_))
    ));
    Ok(())
}

#[test]
fn closed_statement_refuses_work() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("SELECT 1")?;
    stmt.execute_query()?;
    stmt.close();
    stmt.close();
    assert!(stmt.is_closed());
    assert!(!stmt.is_compiled());
    assert!(matches!(stmt.execute(), Err(SqlError::ExecutionError(_))));
    assert!(matches!(stmt.set_int(1, 1), Err(SqlError::ExecutionError(_))));
    Ok(())
}

#[test]
fn statement_outliving_its_connection_errors() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut stmt = db.get_prepared_statement("SELECT 1")?;
    db.close_database()?;
    assert!(matches!(stmt.execute(), Err(SqlError::ConnectionError(_))));
    stmt.close();
    Ok(())
}
