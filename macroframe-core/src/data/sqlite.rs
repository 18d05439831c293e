//! Series source backed by a SQLite file.
//!
//! Fact, exogenous and model stores share one layout (see [`StoreSchema`]);
//! the row type only records which of them a file is.

use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::debug;

use super::schema::StoreSchema;
use super::source::{Observation, SeriesSource, SourceError, SourceState};
use crate::domain::{RowType, SeriesDescription, SourceKind};
use crate::frame::pivot;
use crate::prepare::{apply_steps, PrepareStep};

/// Reads requested series from a SQLite store and pivots them by year.
pub struct DbSource {
    state: SourceState,
    schema: StoreSchema,
    conn: Connection,
}

impl DbSource {
    pub const NAME: &'static str = "sqlite series source";

    /// Open `path` read-only with the default table names.
    pub fn open<I, S>(path: impl Into<PathBuf>, row_type: RowType, codes: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_schema(path, row_type, codes, StoreSchema::default())
    }

    pub fn with_schema<I, S>(
        path: impl Into<PathBuf>,
        row_type: RowType,
        codes: I,
        schema: StoreSchema,
    ) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        schema.validate_names()?;
        let state = SourceState::new(path, row_type, codes)?;
        let conn = Connection::open_with_flags(
            &state.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %state.path.display(), row_type = %row_type, "sqlite source opened");
        Ok(Self { state, schema, conn })
    }

    /// Long-format rows for the requested codes.
    pub fn read_observations(&self) -> Result<Vec<Observation>, SourceError> {
        if self.state.codes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = self.schema.data_query(self.state.codes.len());
        debug!(%sql, codes = self.state.codes.len(), "reading observations");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(self.state.codes.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let date = year_value(row.get_ref(0)?)?;
            let value = real_value(row.get_ref(1)?);
            let Some(code) = text_value(row.get_ref(2)?) else {
                continue;
            };
            out.push(Observation { date, code, value });
        }
        Ok(out)
    }
}

impl SeriesSource for DbSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Sqlite
    }

    fn row_type(&self) -> RowType {
        self.state.row_type
    }

    fn path(&self) -> &Path {
        &self.state.path
    }

    fn codes(&self) -> &[String] {
        &self.state.codes
    }

    fn table(&self) -> String {
        self.schema.data_query(self.state.codes.len())
    }

    fn check(&self) -> Result<bool, SourceError> {
        self.schema.validate(&self.conn)
    }

    fn describe(&self) -> Result<Vec<SeriesDescription>, SourceError> {
        if self.state.codes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = self.schema.header_query(self.state.codes.len());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(self.state.codes.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let Some(code2) = text_value(row.get_ref(1)?) else {
                continue;
            };
            out.push(SeriesDescription {
                code2,
                code: int_value(row.get_ref(0)?),
                group_id: int_value(row.get_ref(2)?),
                name: text_value(row.get_ref(3)?),
                unit: text_value(row.get_ref(4)?),
                source: text_value(row.get_ref(5)?),
                params: text_value(row.get_ref(6)?),
                ..Default::default()
            });
        }

        let position = |code: &str| self.state.codes.iter().position(|c| c == code);
        out.sort_by_key(|d| position(&d.code2));
        Ok(out)
    }

    fn prepare(&self) -> &[PrepareStep] {
        &self.state.prepare
    }

    fn set_prepare(&mut self, steps: Vec<PrepareStep>) {
        self.state.prepare = steps;
    }

    fn make_frame(&mut self) -> Result<&DataFrame, SourceError> {
        let observations = self.read_observations()?;
        let frame = pivot(&observations, &self.state.codes)?;
        let frame = apply_steps(frame, &self.state.prepare)?;
        Ok(self.state.store_frame(frame))
    }

    fn frame(&self) -> Result<&DataFrame, SourceError> {
        self.state.frame()
    }
}

impl fmt::Display for DbSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self as &dyn SeriesSource, f)
    }
}

/// Year from the `date` column. Stores hold it as an integer, but a real or
/// a text value starting with the year is accepted.
fn year_value(v: ValueRef<'_>) -> Result<i32, SourceError> {
    let year = match v {
        ValueRef::Integer(i) => i32::try_from(i).ok(),
        ValueRef::Real(f) if f.fract() == 0.0 => Some(f as i32),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t);
            let text = text.trim();
            text.parse::<i32>()
                .ok()
                .or_else(|| text.get(..4).and_then(|y| y.parse::<i32>().ok()))
        }
        _ => None,
    };
    year.ok_or_else(|| SourceError::InvalidDate(format!("{v:?}")))
}

fn real_value(v: ValueRef<'_>) -> Option<f64> {
    match v {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) if !f.is_nan() => Some(f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn int_value(v: ValueRef<'_>) -> Option<i64> {
    match v {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.fract() == 0.0 => Some(f as i64),
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse().ok(),
        _ => None,
    }
}

fn text_value(v: ValueRef<'_>) -> Option<String> {
    match v {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        _ => None,
    }
}
