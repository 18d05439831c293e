//! Shared helpers: scratch SQLite stores and fixture paths.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

pub const STORE_SCHEMA: &str = "
    CREATE TABLE headers (code INTEGER PRIMARY KEY, mgroup_id INTEGER, name TEXT,
                          unit TEXT, code2 TEXT, source TEXT, params TEXT);
    CREATE TABLE datas (code INTEGER, date INTEGER, value REAL);
";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// One series of a scratch store.
pub struct Series<'a> {
    pub code: i64,
    pub code2: &'a str,
    pub name: &'a str,
    pub params: Option<&'a str>,
    pub points: &'a [(i32, Option<f64>)],
}

/// Write a store with the standard layout holding `series`.
pub fn create_store(dir: &Path, file: &str, series: &[Series<'_>]) -> PathBuf {
    let path = dir.join(file);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(STORE_SCHEMA).unwrap();
    for s in series {
        conn.execute(
            "INSERT INTO headers (code, mgroup_id, name, unit, code2, source, params)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![s.code, 1, s.name, "%", s.code2, "Росстат", s.params],
        )
        .unwrap();
        for (date, value) in s.points {
            conn.execute(
                "INSERT INTO datas (code, date, value) VALUES (?1, ?2, ?3)",
                params![s.code, date, value],
            )
            .unwrap();
        }
    }
    path
}

/// A model-output store: CPIAv and LevelRate forecasts for 2017..=2021.
pub fn model_store(dir: &Path) -> PathBuf {
    create_store(
        dir,
        "model.sqlite3",
        &[
            Series {
                code: 1,
                code2: "CPIAv",
                name: "ИПЦ, в среднем за год",
                params: None,
                points: &[
                    (2017, Some(9.0)),
                    (2018, Some(9.0)),
                    (2019, Some(9.0)),
                    (2020, Some(9.0)),
                    (2021, Some(9.0)),
                ],
            },
            Series {
                code: 2,
                code2: "GDP",
                name: "ВВП",
                params: None,
                points: &[(2020, Some(100.0)), (2021, Some(104.0)), (2022, Some(107.0))],
            },
        ],
    )
}
