//! Wide frames: pivoting long observations and aligning frames by date.
//!
//! A wide frame is a polars `DataFrame` with an `Int32` `date` column (year,
//! ascending, unique) followed by one nullable `Float64` column per series
//! code. Missing points are null, never NaN.

use std::collections::{BTreeSet, HashMap, HashSet};

use polars::prelude::*;

use crate::data::source::{Observation, SourceError};

/// Name of the index column of every wide frame.
pub const DATE_COLUMN: &str = "date";

/// A wide frame with no dates and no series.
pub fn empty_frame() -> DataFrame {
    DataFrame::new(vec![Column::new(DATE_COLUMN.into(), Vec::<i32>::new())])
        .unwrap_or_default()
}

/// Series codes must not collide with the index column.
pub fn check_codes(codes: &[String]) -> Result<(), SourceError> {
    if codes.iter().any(|c| c == DATE_COLUMN) {
        return Err(SourceError::InvalidInput(format!(
            "'{DATE_COLUMN}' is the index column and cannot be a series code"
        )));
    }
    Ok(())
}

/// Pivot long observations into a wide frame.
///
/// Columns follow the order of `codes` (first occurrence) and only include
/// codes that occur in `observations`; observations for other codes are
/// ignored. The same
/// `(date, code)` pair appearing twice is an error.
pub fn pivot(observations: &[Observation], codes: &[String]) -> Result<DataFrame, SourceError> {
    check_codes(codes)?;
    let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();

    let mut dates = BTreeSet::new();
    let mut cells: HashMap<(i32, &str), Option<f64>> = HashMap::new();
    for obs in observations {
        if !wanted.contains(obs.code.as_str()) {
            continue;
        }
        let value = obs.value.filter(|v| !v.is_nan());
        if cells.insert((obs.date, obs.code.as_str()), value).is_some() {
            return Err(SourceError::DuplicateObservation {
                code: obs.code.clone(),
                date: obs.date,
            });
        }
        dates.insert(obs.date);
    }

    let present: HashSet<&str> = cells.keys().map(|(_, code)| *code).collect();
    let dates: Vec<i32> = dates.into_iter().collect();

    let mut emitted = HashSet::new();
    let mut columns = vec![Column::new(DATE_COLUMN.into(), dates.clone())];
    for code in codes
        .iter()
        .filter(|c| present.contains(c.as_str()) && emitted.insert(c.as_str()))
    {
        let values: Vec<Option<f64>> = dates
            .iter()
            .map(|d| cells.get(&(*d, code.as_str())).copied().flatten())
            .collect();
        columns.push(Column::new(code.as_str().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Series column names of a wide frame, in frame order.
pub fn series_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|s| s != DATE_COLUMN)
        .collect()
}

/// The `date` column as years.
pub fn frame_dates(df: &DataFrame) -> PolarsResult<Vec<i32>> {
    let dates = df.column(DATE_COLUMN)?.cast(&DataType::Int32)?;
    dates
        .i32()?
        .into_iter()
        .map(|d| d.ok_or_else(|| PolarsError::ComputeError("null in date column".into())))
        .collect()
}

/// Values of one series column; NaN is reported as missing.
pub fn column_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Requested codes absent from `df`, in request order.
pub fn missing_codes(requested: &[String], df: &DataFrame) -> Vec<String> {
    let present: HashSet<String> = series_columns(df).into_iter().collect();
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|c| !present.contains(*c) && seen.insert(c.as_str()))
        .cloned()
        .collect()
}

/// Layer `fallback` under `primary`.
///
/// The result covers the union of both frames' dates and columns. A cell
/// keeps the primary value when it is present and takes the fallback value
/// otherwise. Primary columns come first, then columns only the fallback has.
pub fn combine_first(primary: &DataFrame, fallback: &DataFrame) -> PolarsResult<DataFrame> {
    let primary_dates = frame_dates(primary)?;
    let fallback_dates = frame_dates(fallback)?;

    let dates: Vec<i32> = primary_dates
        .iter()
        .chain(fallback_dates.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let primary_rows = row_lookup(&primary_dates);
    let fallback_rows = row_lookup(&fallback_dates);

    let primary_cols = series_columns(primary);
    let primary_set: HashSet<&str> = primary_cols.iter().map(String::as_str).collect();
    let fallback_cols = series_columns(fallback);

    let mut names = primary_cols.clone();
    names.extend(
        fallback_cols
            .iter()
            .filter(|c| !primary_set.contains(c.as_str()))
            .cloned(),
    );

    let mut columns = vec![Column::new(DATE_COLUMN.into(), dates.clone())];
    for name in &names {
        let top = lookup_values(primary, name, &primary_set)?;
        let bottom = if fallback_cols.contains(name) {
            Some(column_values(fallback, name)?)
        } else {
            None
        };

        let merged: Vec<Option<f64>> = dates
            .iter()
            .map(|d| {
                let from_top = top
                    .as_ref()
                    .zip(primary_rows.get(d))
                    .and_then(|(vals, &i)| vals[i]);
                from_top.or_else(|| {
                    bottom
                        .as_ref()
                        .zip(fallback_rows.get(d))
                        .and_then(|(vals, &i)| vals[i])
                })
            })
            .collect();
        columns.push(Column::new(name.as_str().into(), merged));
    }

    DataFrame::new(columns)
}

fn row_lookup(dates: &[i32]) -> HashMap<i32, usize> {
    dates.iter().enumerate().map(|(i, d)| (*d, i)).collect()
}

fn lookup_values(
    df: &DataFrame,
    name: &str,
    present: &HashSet<&str>,
) -> PolarsResult<Option<Vec<Option<f64>>>> {
    if present.contains(name) {
        column_values(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Deterministic BLAKE3 hash over a wide frame's column names, dates and
/// values, in frame order.
pub fn frame_fingerprint(df: &DataFrame) -> PolarsResult<String> {
    let mut hasher = blake3::Hasher::new();

    for date in frame_dates(df)? {
        hasher.update(&date.to_le_bytes());
    }
    for name in series_columns(df) {
        hasher.update(name.as_bytes());
        hasher.update(&[0xff]);
        for value in column_values(df, &name)? {
            match value {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}
