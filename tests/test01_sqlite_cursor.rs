#![cfg(feature = "sqlite")]

use portable_sql::DatabaseSpec;
use portable_sql::prelude::*;

const CREATE: &str = "
    CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL, qty INTEGER, data BLOB);
    INSERT INTO items (name, price, qty, data) VALUES ('apple', 1.5, 10, x'0102');
    INSERT INTO items (name, price, qty, data) VALUES ('pear', 2.0, 3, NULL);
    INSERT INTO items (name, price, qty, data) VALUES ('plum', NULL, 70000, NULL);
";

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
fn next_visits_every_row_once() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items ORDER BY id")?;
    assert_eq!(cursor.count()?, 3);

    let mut names = Vec::new();
    while cursor.next()? {
        names.push(cursor.get_string(0_usize)?);
    }
    assert_eq!(names, ["apple", "pear", "plum"]);
    assert!(!cursor.next()?);
    assert_eq!(cursor.position(), Position::AfterLast);
    assert_eq!(cursor.count()?, 3);
    Ok(())
}

#[test]
fn typed_getters_follow_widening_rules() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT id, name, price, qty, data FROM items ORDER BY id")?;
    assert!(cursor.next()?);

    assert_eq!(cursor.get_int("qty")?, 10);
    assert_eq!(cursor.get_long("QTY")?, 10);
    assert!((cursor.get_double("qty")? - 10.0).abs() < f64::EPSILON);
    assert!((cursor.get_float("Price")? - 1.5).abs() < f32::EPSILON);
    assert_eq!(cursor.get_blob("data")?, vec![1, 2]);
    assert_eq!(cursor.get_string("price")?, "1.5");
    assert!(matches!(
        cursor.get_int("name"),
        Err(SqlError::CursorError(_))
    ));

    assert!(cursor.next()?);
    assert!(cursor.is_null("data")?);
    assert_eq!(cursor.get::<Option<Vec<u8>>, _>("data")?, None);

    assert!(cursor.next()?);
    assert_eq!(cursor.get_int("qty")?, 70_000);
    assert!(matches!(
        cursor.get_short("qty"),
        Err(SqlError::CursorError(_))
    ));
    Ok(())
}

#[test]
fn reads_off_a_row_fail() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items")?;
    assert_eq!(cursor.position(), Position::BeforeFirst);
    assert!(matches!(
        cursor.get_string("name"),
        Err(SqlError::CursorError(msg)) if msg.contains("not on a valid row")
    ));
    while cursor.next()? {}
    assert!(matches!(
        cursor.get_string("name"),
        Err(SqlError::CursorError(_))
    ));
    Ok(())
}

#[test]
fn unknown_column_is_reported() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items")?;
    assert!(cursor.next()?);
    let err = cursor.get_string("nope").unwrap_err();
    assert!(matches!(&err, SqlError::CursorError(msg) if msg.contains("column not found")));
    assert!(matches!(cursor.get_string(5_usize), Err(SqlError::CursorError(_))));
    Ok(())
}

#[test]
fn buffered_cursor_repositions_anywhere() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items ORDER BY id")?;
    assert!(cursor.supports_random_access());
    cursor.reposition(2)?;
    assert_eq!(cursor.get_string("name")?, "plum");
    cursor.reposition(0)?;
    assert_eq!(cursor.get_string("name")?, "apple");
    assert!(matches!(cursor.reposition(3), Err(SqlError::CursorError(_))));
    assert!(matches!(cursor.reposition(-1), Err(SqlError::CursorError(_))));
    assert_eq!(cursor.position(), Position::Row(0));
    assert!(cursor.next()?);
    assert_eq!(cursor.get_string("name")?, "pear");
    Ok(())
}

#[test]
fn requery_resets_rows_columns_and_position() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items ORDER BY id")?;
    assert!(cursor.next()?);

    db.raw_query_into(&mut cursor, "SELECT qty FROM items WHERE qty > 5 ORDER BY qty")?;
    assert_eq!(cursor.position(), Position::BeforeFirst);
    assert_eq!(cursor.count()?, 2);
    assert_eq!(cursor.columns().names(), ["qty"]);
    assert!(cursor.next()?);
    assert_eq!(cursor.get_long("qty")?, 10);
    assert!(matches!(cursor.get_string("name"), Err(SqlError::CursorError(_))));
    Ok(())
}

#[test]
fn requery_into_foreign_cursor_is_refused() -> Result<(), SqlError> {
    let mut first = open_memory()?;
    let mut second = open_memory()?;
    let mut cursor = first.raw_query("SELECT name FROM items")?;
    assert!(matches!(
        second.raw_query_into(&mut cursor, "SELECT qty FROM items"),
        Err(SqlError::CursorError(_))
    ));
    assert_eq!(cursor.count()?, 3);
    Ok(())
}

#[test]
fn close_is_idempotent() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name FROM items")?;
    cursor.close();
    cursor.close();
    assert!(cursor.is_closed());
    assert!(matches!(cursor.next(), Err(SqlError::CursorError(_))));
    assert!(matches!(cursor.count(), Err(SqlError::CursorError(_))));

    db.raw_query_into(&mut cursor, "SELECT name FROM items")?;
    assert!(!cursor.is_closed());
    assert!(cursor.next()?);
    Ok(())
}

#[test]
fn empty_result_keeps_columns() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT * FROM items WHERE 0")?;
    assert_eq!(cursor.count()?, 0);
    assert_eq!(cursor.columns().len(), 5);
    assert!(!cursor.next()?);
    Ok(())
}

#[test]
fn exec_sql_takes_one_statement() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let err = db
        .exec_sql("INSERT INTO items (name) VALUES ('a'); INSERT INTO items (name) VALUES ('b')")
        .unwrap_err();
    assert!(matches!(err, SqlError::ExecutionError(_)));
    db.exec_sql("INSERT INTO items (name) VALUES ('fig; with semicolon');")?;
    let mut cursor = db.raw_query("SELECT count(*) AS n FROM items")?;
    assert!(cursor.next()?);
    assert_eq!(cursor.get_long("n")?, 4);
    assert!(matches!(
        db.exec_sql("INSERT INTO missing VALUES (1)"),
        Err(SqlError::ExecutionError(_))
    ));
    Ok(())
}

#[test]
fn cursors_work_behind_dyn() -> Result<(), SqlError> {
    let mut db = open_memory()?;
    let mut cursor = db.raw_query("SELECT name, qty FROM items ORDER BY id")?;
    let dynamic: &mut dyn Cursor = &mut cursor;
    assert!(dynamic.next()?);
    assert_eq!(dynamic.get_string("NAME")?, "apple");
    assert_eq!(dynamic.get_int(1_usize)?, 10);
    Ok(())
}

#[test]
fn insert_then_read_back() -> Result<(), SqlError> {
    let mut db = SqliteDatabase::new(
        DatabaseSpec::new(":memory:", 1, "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)", ""),
        SqliteOptions::new(":memory:"),
    );
    db.setup_database()?;
    db.open_or_create_database()?;
    assert_eq!(db.get_last_row_id()?, -1);

    db.exec_sql("INSERT INTO t(v) VALUES('a')")?;
    assert_eq!(db.get_last_row_id()?, 1);

    let mut cursor = db.raw_query("SELECT * FROM t")?;
    assert_eq!(cursor.count()?, 1);
    assert!(cursor.next()?);
    assert_eq!(cursor.get_string("v")?, "a");
    Ok(())
}
