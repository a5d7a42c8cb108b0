//! Criterion comparison of a full-table scan through raw `rusqlite` against the
//! same scan through `portable-sql` cursors. Both read an identical on-disk
//! dataset so the numbers reflect cursor overhead rather than storage.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use portable_sql::DatabaseSpec;
use portable_sql::prelude::*;
use rusqlite::{Connection, params};
use std::fs;
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const SCAN: &str = "SELECT id, name, score, active FROM test ORDER BY id";

// Seed one file for every variant.
static DATASET: LazyLock<PathBuf> = LazyLock::new(|| {
    let path = std::env::temp_dir().join("portable_sql_bench_cursor_scan.db");
    prepare_dataset(&path, row_count()).expect("failed to prepare SQLite dataset");
    path
});

/// Rows in the scanned table; override with `BENCH_ROWS`.
fn row_count() -> usize {
    std::env::var("BENCH_ROWS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(10_000)
}

fn prepare_dataset(path: &Path, rows: usize) -> rusqlite::Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|_| rusqlite::Error::InvalidPath(path.to_path_buf()))?;
    }
    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        "
        CREATE TABLE test (
            id      INTEGER PRIMARY KEY,
            name    TEXT NOT NULL,
            score   REAL NOT NULL,
            active  INTEGER NOT NULL
        );
        PRAGMA user_version = 1;
        ",
    )?;
    let tx = conn.transaction()?;
    {
        let mut insert =
            tx.prepare("INSERT INTO test (id, name, score, active) VALUES (?1, ?2, ?3, ?4)")?;
        for id in 1..=rows as i64 {
            insert.execute(params![id, format!("name-{id}"), id as f64 * 0.5, id % 2 == 0])?;
        }
    }
    tx.commit()
}

/// Same decode in every variant.
#[derive(Debug)]
struct BenchRow {
    id: i64,
    name: String,
    score: f64,
    active: bool,
}

impl BenchRow {
    fn from_cursor<C: Cursor>(cursor: &C) -> Result<Self, SqlError> {
        Ok(Self {
            id: cursor.get_long(0_usize)?,
            name: cursor.get_string(1_usize)?,
            score: cursor.get_double(2_usize)?,
            active: cursor.get_long(3_usize)? != 0,
        })
    }
}

fn bench_rusqlite_direct(group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    let conn = Connection::open(&*DATASET).expect("open sqlite connection");
    group.bench_function(BenchmarkId::new("rusqlite", row_count()), |b| {
        b.iter(|| {
            let mut stmt = conn.prepare_cached(SCAN).expect("prepare scan");
            let mut rows = stmt.query([]).expect("run scan");
            while let Some(row) = rows.next().expect("step scan") {
                black_box(BenchRow {
                    id: row.get(0).expect("id"),
                    name: row.get(1).expect("name"),
                    score: row.get(2).expect("score"),
                    active: row.get(3).expect("active"),
                });
            }
        });
    });
}

fn bench_database<D: Database>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    label: &str,
    mut db: D,
) {
    db.setup_database().expect("setup");
    db.open_or_create_database().expect("open");
    let mut cursor = db.raw_query(SCAN).expect("first scan");
    group.bench_function(BenchmarkId::new(label, row_count()), |b| {
        b.iter(|| {
            db.raw_query_into(&mut cursor, SCAN).expect("scan");
            while cursor.next().expect("step") {
                black_box(BenchRow::from_cursor(&cursor).expect("decode"));
            }
        });
    });
    cursor.close();
    db.close_database().expect("close");
}

fn spec() -> DatabaseSpec {
    DatabaseSpec::new("bench", 1, "", "")
}

fn cursor_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_scan");
    group.throughput(Throughput::Elements(row_count() as u64));

    bench_rusqlite_direct(&mut group);
    bench_database(
        &mut group,
        "sqlite_buffered",
        SqliteDatabase::new(spec(), SqliteOptions::new(&*DATASET)),
    );
    #[cfg(feature = "turso")]
    {
        bench_database(
            &mut group,
            "turso_streaming",
            TursoDatabase::new(spec(), TursoOptions::new(&*DATASET)),
        );
        bench_database(
            &mut group,
            "turso_buffered",
            TursoDatabase::new(spec(), TursoOptions::new(&*DATASET))
                .with_cursor_mode(CursorMode::Buffered),
        );
    }

    group.finish();
}

criterion_group!(benches, cursor_scan);
criterion_main!(benches);
