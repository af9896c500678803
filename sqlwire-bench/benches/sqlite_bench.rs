//! SQLite adapter benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sqlwire_protocol::{Codec, Query, Row};
use sqlwire_sqlite::Database;

fn seeded(rows: usize) -> Database {
    let db = Database::open_in_memory().unwrap();
    db.exec(&Query::new(
        "CREATE TABLE account (id INTEGER PRIMARY KEY, name TEXT NOT NULL, balance REAL)",
    ))
    .unwrap();
    for i in 0..rows {
        db.insert_row(
            "account",
            &Row::new()
                .with("name", format!("user-{}", i))
                .with("balance", i as f64),
        )
        .unwrap();
    }
    db
}

fn bench_select_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_encode");

    for rows in [10, 100, 1000] {
        let db = seeded(rows);
        let query = Query::new("SELECT * FROM account");

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &query, |b, query| {
            b.iter(|| black_box(db.select(query).unwrap().encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_insert_row(c: &mut Criterion) {
    let db = seeded(0);
    let row = Row::new().with("name", "bench").with("balance", 1.0);

    c.bench_function("insert_row", |b| {
        b.iter(|| black_box(db.insert_row("account", &row).unwrap()));
    });
}

criterion_group!(benches, bench_select_encode, bench_insert_row);

criterion_main!(benches);
