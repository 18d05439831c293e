//! Series source backed by an Excel workbook.
//!
//! Two sheet layouts exist. Both grow to the right: a block of description
//! columns comes first, followed by one column per year.
//!
//! - legacy (fact workbooks): two rows above the header, six description
//!   columns `code, name, unit, code2, comments, last_date`
//! - current (model workbooks): header on the first row, seven description
//!   columns `code, name, code2, source, type, bd, unit`

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::source::{Observation, SeriesSource, SourceError, SourceState};
use crate::domain::{RowType, SeriesDescription, SourceKind};
use crate::frame::pivot;
use crate::prepare::{apply_steps, PrepareStep};

/// Sheet to read, by name or zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Name("YEAR".into())
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "#{i}"),
            SheetSelector::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for SheetSelector {
    /// All-digit input selects by position, anything else by name.
    fn from(s: &str) -> Self {
        match s.parse::<usize>() {
            Ok(i) => SheetSelector::Index(i),
            Err(_) => SheetSelector::Name(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetLayout {
    Legacy,
    Current,
}

const LEGACY_COLUMNS: [&str; 6] = ["code", "name", "unit", "code2", "comments", "last_date"];
const CURRENT_COLUMNS: [&str; 7] = ["code", "name", "code2", "source", "type", "bd", "unit"];

impl SheetLayout {
    /// Fact workbooks use the legacy layout; every other row type the
    /// current one.
    pub fn for_row_type(row_type: RowType) -> Self {
        match row_type {
            RowType::Fact => SheetLayout::Legacy,
            RowType::ExogR | RowType::ExogP | RowType::Model => SheetLayout::Current,
        }
    }

    /// Zero-based sheet row holding the column labels.
    pub fn header_row(self) -> u32 {
        match self {
            SheetLayout::Legacy => 2,
            SheetLayout::Current => 0,
        }
    }

    pub fn description_columns(self) -> &'static [&'static str] {
        match self {
            SheetLayout::Legacy => &LEGACY_COLUMNS,
            SheetLayout::Current => &CURRENT_COLUMNS,
        }
    }

    fn position(self, column: &str) -> Option<u32> {
        self.description_columns()
            .iter()
            .position(|c| *c == column)
            .map(|p| p as u32)
    }
}

/// Descriptions and long-format rows read from one sheet.
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub descriptions: Vec<SeriesDescription>,
    pub observations: Vec<Observation>,
}

/// Year columns of a sheet as `(sheet column, year)`.
///
/// The header must hold exactly the layout's description columns followed
/// by year labels.
pub fn year_columns(range: &Range<Data>, layout: SheetLayout) -> Result<Vec<(u32, i32)>, SourceError> {
    let Some((_, last_col)) = range.end() else {
        return Err(SourceError::LayoutMismatch("sheet is empty".into()));
    };
    let header = layout.header_row();
    let labels: Vec<Option<String>> = (0..=last_col)
        .map(|c| cell_text(range.get_value((header, c))))
        .collect();
    let width = labels.iter().rposition(Option::is_some).map_or(0, |p| p + 1);
    let n_desc = layout.description_columns().len();

    if width < n_desc {
        return Err(SourceError::LayoutMismatch(format!(
            "header row {} has {width} columns, expected at least {n_desc}",
            header + 1
        )));
    }

    for (c, label) in labels.iter().enumerate().take(n_desc) {
        if let Some(year) = label.as_deref().and_then(year_label) {
            return Err(SourceError::LayoutMismatch(format!(
                "column {} holds year {year} where description column '{}' is expected",
                c + 1,
                layout.description_columns()[c]
            )));
        }
    }

    labels[n_desc..width]
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let col = (n_desc + i) as u32;
            label
                .as_deref()
                .and_then(year_label)
                .map(|year| (col, year))
                .ok_or_else(|| {
                    SourceError::LayoutMismatch(format!(
                        "column {} header '{}' is not a year",
                        col + 1,
                        label.as_deref().unwrap_or("")
                    ))
                })
        })
        .collect()
}

/// Read the rows for `codes` from a sheet in `layout`.
///
/// Rows are matched on their `code2` cell; a code listed twice keeps its
/// first row. Descriptions come back in request order.
pub fn parse_sheet(
    range: &Range<Data>,
    layout: SheetLayout,
    codes: &[String],
) -> Result<ParsedSheet, SourceError> {
    let years = year_columns(range, layout)?;
    let Some((last_row, _)) = range.end() else {
        return Ok(ParsedSheet::default());
    };

    let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
    let col = |name: &str| layout.position(name);
    let code2_col = col("code2").unwrap_or_default();

    let mut seen = HashSet::new();
    let mut parsed = ParsedSheet::default();
    for row in layout.header_row() + 1..=last_row {
        let Some(code2) = cell_text(range.get_value((row, code2_col))) else {
            continue;
        };
        if !wanted.contains(code2.as_str()) {
            continue;
        }
        if !seen.insert(code2.clone()) {
            warn!(code = %code2, row = row + 1, "series listed twice in sheet, keeping first row");
            continue;
        }

        let text = |name: &str| col(name).and_then(|c| cell_text(range.get_value((row, c))));
        parsed.descriptions.push(SeriesDescription {
            code2: code2.clone(),
            code: col("code").and_then(|c| cell_int(range.get_value((row, c)))),
            name: text("name"),
            unit: text("unit"),
            source: text("source"),
            kind: text("type"),
            database: text("bd"),
            ..Default::default()
        });

        for &(c, year) in &years {
            parsed.observations.push(Observation {
                date: year,
                code: code2.clone(),
                value: cell_number(range.get_value((row, c))),
            });
        }
    }

    let position = |code: &str| codes.iter().position(|c| c == code);
    parsed.descriptions.sort_by_key(|d| position(&d.code2));
    Ok(parsed)
}

/// Reads requested series from one sheet of an Excel workbook.
#[derive(Debug)]
pub struct ExcelSource {
    state: SourceState,
    sheet: SheetSelector,
}

impl ExcelSource {
    pub const NAME: &'static str = "excel series source";

    /// Source reading the `YEAR` sheet.
    pub fn open<I, S>(path: impl Into<PathBuf>, row_type: RowType, codes: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_sheet(path, row_type, codes, SheetSelector::default())
    }

    pub fn with_sheet<I, S>(
        path: impl Into<PathBuf>,
        row_type: RowType,
        codes: I,
        sheet: SheetSelector,
    ) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = SourceState::new(path, row_type, codes)?;
        Ok(Self { state, sheet })
    }

    pub fn sheet(&self) -> &SheetSelector {
        &self.sheet
    }

    pub fn layout(&self) -> SheetLayout {
        SheetLayout::for_row_type(self.state.row_type)
    }

    fn read_range(&self) -> Result<Range<Data>, SourceError> {
        let mut workbook = open_workbook_auto(&self.state.path)?;
        let range = match &self.sheet {
            SheetSelector::Name(name) => {
                if !workbook.sheet_names().iter().any(|s| s == name) {
                    return Err(SourceError::SheetNotFound(name.clone()));
                }
                workbook.worksheet_range(name)?
            }
            SheetSelector::Index(i) => workbook
                .worksheet_range_at(*i)
                .ok_or_else(|| SourceError::SheetNotFound(self.sheet.to_string()))??,
        };
        debug!(
            path = %self.state.path.display(),
            sheet = %self.sheet,
            layout = ?self.layout(),
            "sheet read"
        );
        Ok(range)
    }

    fn parse(&self) -> Result<ParsedSheet, SourceError> {
        parse_sheet(&self.read_range()?, self.layout(), &self.state.codes)
    }
}

impl SeriesSource for ExcelSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Excel
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
        self.sheet.to_string()
    }

    fn check(&self) -> Result<bool, SourceError> {
        let range = match self.read_range() {
            Ok(range) => range,
            Err(SourceError::SheetNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        match year_columns(&range, self.layout()) {
            Ok(_) => Ok(true),
            Err(SourceError::LayoutMismatch(reason)) => {
                debug!(%reason, "sheet layout check failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> Result<Vec<SeriesDescription>, SourceError> {
        Ok(self.parse()?.descriptions)
    }

    fn prepare(&self) -> &[PrepareStep] {
        &self.state.prepare
    }

    fn set_prepare(&mut self, steps: Vec<PrepareStep>) {
        self.state.prepare = steps;
    }

    fn make_frame(&mut self) -> Result<&DataFrame, SourceError> {
        let parsed = self.parse()?;
        let frame = pivot(&parsed.observations, &self.state.codes)?;
        let frame = apply_steps(frame, &self.state.prepare)?;
        Ok(self.state.store_frame(frame))
    }

    fn frame(&self) -> Result<&DataFrame, SourceError> {
        self.state.frame()
    }
}

impl fmt::Display for ExcelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self as &dyn SeriesSource, f)
    }
}

/// Year encoded in a column label: the whole label when it is an integer
/// containing four digits, otherwise the first run of four digits.
pub fn year_label(label: &str) -> Option<i32> {
    let label = label.trim();
    let bytes = label.as_bytes();
    let start = bytes
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))?;
    label
        .parse::<i32>()
        .ok()
        .or_else(|| label[start..start + 4].parse().ok())
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn cell_number(cell: Option<&Data>) -> Option<f64> {
    match cell? {
        Data::Float(f) if !f.is_nan() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        _ => None,
    }
}

fn cell_int(cell: Option<&Data>) -> Option<i64> {
    match cell? {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{column_values, frame_dates, series_columns};

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn grid(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn legacy_sheet() -> Range<Data> {
        grid(vec![
            vec![s("Database export")],
            vec![Data::Empty],
            vec![
                s("Код"),
                s("Наименование"),
                s("Ед."),
                s("Код2"),
                s("Комментарий"),
                s("Посл."),
                Data::Float(2010.0),
                Data::Float(2011.0),
                s("2012"),
            ],
            vec![
                Data::Float(1.0),
                s("CPI, average"),
                s("%"),
                s("CPIAv"),
                Data::Empty,
                Data::Float(2012.0),
                Data::Float(6.9),
                Data::Float(8.4),
                Data::Float(5.1),
            ],
            vec![
                Data::Float(2.0),
                s("Key rate"),
                s("%"),
                s("LevelRate"),
                Data::Empty,
                Data::Float(2011.0),
                Data::Float(7.75),
                Data::Empty,
                s("n/a"),
            ],
            vec![
                Data::Float(3.0),
                s("Not requested"),
                s("%"),
                s("other"),
                Data::Empty,
                Data::Empty,
                Data::Float(1.0),
                Data::Float(1.0),
                Data::Float(1.0),
            ],
        ])
    }

    fn current_sheet() -> Range<Data> {
        grid(vec![
            vec![
                s("code"),
                s("name"),
                s("code2"),
                s("source"),
                s("type"),
                s("bd"),
                s("unit"),
                Data::Int(2020),
                Data::Int(2021),
            ],
            vec![
                Data::Int(10),
                s("Loan rate"),
                s("loan_rate"),
                s("CBR"),
                s("exog"),
                s("year"),
                s("%"),
                Data::Float(9.5),
                Data::Float(8.0),
            ],
        ])
    }

    #[test]
    fn layout_follows_row_type() {
        assert_eq!(SheetLayout::for_row_type(RowType::Fact), SheetLayout::Legacy);
        for rt in [RowType::ExogR, RowType::ExogP, RowType::Model] {
            assert_eq!(SheetLayout::for_row_type(rt), SheetLayout::Current);
        }
        assert_eq!(SheetLayout::Legacy.description_columns().len(), 6);
        assert_eq!(SheetLayout::Current.description_columns().len(), 7);
        assert_eq!(SheetLayout::Legacy.header_row(), 2);
        assert_eq!(SheetLayout::Current.header_row(), 0);
    }

    #[test]
    fn year_label_detection() {
        assert_eq!(year_label("2010"), Some(2010));
        assert_eq!(year_label(" 1999 "), Some(1999));
        assert_eq!(year_label("2015г"), Some(2015));
        assert_eq!(year_label("unit"), None);
        assert_eq!(year_label("201"), None);
    }

    #[test]
    fn legacy_sheet_skips_two_rows_and_six_columns() {
        let sheet = legacy_sheet();
        let years = year_columns(&sheet, SheetLayout::Legacy).unwrap();
        assert_eq!(years, vec![(6, 2010), (7, 2011), (8, 2012)]);

        let parsed =
            parse_sheet(&sheet, SheetLayout::Legacy, &codes(&["LevelRate", "CPIAv", "absent"]))
                .unwrap();

        let described: Vec<_> = parsed.descriptions.iter().map(|d| d.code2.as_str()).collect();
        assert_eq!(described, vec!["LevelRate", "CPIAv"]);
        let cpi = &parsed.descriptions[1];
        assert_eq!(cpi.code, Some(1));
        assert_eq!(cpi.name.as_deref(), Some("CPI, average"));
        assert_eq!(cpi.unit.as_deref(), Some("%"));
        assert_eq!(cpi.source, None);

        let df = pivot(&parsed.observations, &codes(&["LevelRate", "CPIAv", "absent"])).unwrap();
        assert_eq!(series_columns(&df), vec!["LevelRate", "CPIAv"]);
        assert_eq!(frame_dates(&df).unwrap(), vec![2010, 2011, 2012]);
        assert_eq!(
            column_values(&df, "LevelRate").unwrap(),
            vec![Some(7.75), None, None]
        );
        assert_eq!(
            column_values(&df, "CPIAv").unwrap(),
            vec![Some(6.9), Some(8.4), Some(5.1)]
        );
    }

    #[test]
    fn current_sheet_reads_seven_description_columns() {
        let parsed = parse_sheet(&current_sheet(), SheetLayout::Current, &codes(&["loan_rate"])).unwrap();
        let d = &parsed.descriptions[0];
        assert_eq!(d.code, Some(10));
        assert_eq!(d.source.as_deref(), Some("CBR"));
        assert_eq!(d.kind.as_deref(), Some("exog"));
        assert_eq!(d.database.as_deref(), Some("year"));
        assert_eq!(d.unit.as_deref(), Some("%"));
        assert_eq!(parsed.observations.len(), 2);
        assert_eq!(parsed.observations[0], Observation::new(2020, "loan_rate", Some(9.5)));
    }

    #[test]
    fn wrong_layout_is_rejected() {
        // A current-layout sheet read as legacy: the header row is a data row.
        assert!(matches!(
            year_columns(&current_sheet(), SheetLayout::Legacy),
            Err(SourceError::LayoutMismatch(_))
        ));
        // A legacy sheet read as current: row 1 is a title, not a header.
        assert!(matches!(
            year_columns(&legacy_sheet(), SheetLayout::Current),
            Err(SourceError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn duplicate_code_rows_keep_the_first() {
        let mut rows = vec![
            vec![
                s("code"),
                s("name"),
                s("code2"),
                s("source"),
                s("type"),
                s("bd"),
                s("unit"),
                Data::Int(2020),
            ],
        ];
        for v in [1.0, 2.0] {
            rows.push(vec![
                Data::Empty,
                Data::Empty,
                s("x"),
                Data::Empty,
                Data::Empty,
                Data::Empty,
                Data::Empty,
                Data::Float(v),
            ]);
        }
        let parsed = parse_sheet(&grid(rows), SheetLayout::Current, &codes(&["x"])).unwrap();
        assert_eq!(parsed.descriptions.len(), 1);
        assert_eq!(parsed.observations, vec![Observation::new(2020, "x", Some(1.0))]);
    }

    #[test]
    fn sheet_selector_from_text() {
        assert_eq!(SheetSelector::from("0"), SheetSelector::Index(0));
        assert_eq!(SheetSelector::from("YEAR"), SheetSelector::Name("YEAR".into()));
        assert_eq!(SheetSelector::default().to_string(), "YEAR");
    }
}
