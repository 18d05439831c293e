//! CSV and JSON export of wide frames and series descriptions.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;

use crate::domain::SeriesDescription;
use crate::frame::{column_values, frame_dates, series_columns, DATE_COLUMN};

/// Render a wide frame as CSV: `date` then one column per series, empty
/// cells for missing values.
pub fn frame_to_csv(df: &DataFrame) -> Result<String> {
    let names = series_columns(df);
    let dates = frame_dates(df).context("frame has no usable date column")?;
    let columns = names
        .iter()
        .map(|name| column_values(df, name).with_context(|| format!("failed to read column '{name}'")))
        .collect::<Result<Vec<_>>>()?;

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(std::iter::once(DATE_COLUMN).chain(names.iter().map(String::as_str)))?;
    for (row, date) in dates.iter().enumerate() {
        let mut record = vec![date.to_string()];
        record.extend(
            columns
                .iter()
                .map(|values| values[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write a wide frame to `path` as CSV.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let csv = frame_to_csv(df)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

pub fn descriptions_to_csv(descriptions: &[SeriesDescription]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["code2", "code", "group_id", "name", "unit", "source", "type", "bd", "params"])?;
    for d in descriptions {
        wtr.write_record([
            d.code2.as_str(),
            &d.code.map(|c| c.to_string()).unwrap_or_default(),
            &d.group_id.map(|g| g.to_string()).unwrap_or_default(),
            d.name.as_deref().unwrap_or(""),
            d.unit.as_deref().unwrap_or(""),
            d.source.as_deref().unwrap_or(""),
            d.kind.as_deref().unwrap_or(""),
            d.database.as_deref().unwrap_or(""),
            d.params.as_deref().unwrap_or(""),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn descriptions_to_json(descriptions: &[SeriesDescription]) -> Result<String> {
    serde_json::to_string_pretty(descriptions).context("failed to serialize series descriptions")
}
