//! Series source trait and structured error types.
//!
//! The SeriesSource trait abstracts over stores (SQLite files, Excel
//! workbooks) so a working frame can be assembled from any mix of them and
//! mocked in tests.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{RowType, SeriesDescription, SourceKind};
use crate::frame::{check_codes, missing_codes};
use crate::prepare::PrepareStep;

/// One long-format observation before pivoting.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: i32,
    pub code: String,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: i32, code: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            date,
            code: code.into(),
            value,
        }
    }
}

/// Structured error types for source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("sheet layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("duplicate observation for '{code}' at {date}")]
    DuplicateObservation { code: String, date: i32 },

    #[error("invalid date value: {0}")]
    InvalidDate(String),

    #[error("frame not loaded: call make_frame() before reading it")]
    FrameNotLoaded,

    #[error("column '{column}' is not in the frame")]
    UnknownColumn { column: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Trait for series stores (SQLite database files, Excel workbooks).
///
/// A source is bound to one file, one row type and one list of requested
/// codes. It holds no data until [`SeriesSource::make_frame`] runs; the
/// produced frame is cached until the next call.
pub trait SeriesSource {
    /// Human-readable name of this source type.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn row_type(&self) -> RowType;

    fn path(&self) -> &Path;

    /// Requested codes, including those absent from the store.
    fn codes(&self) -> &[String];

    /// The query run against the store, or the sheet that is read.
    fn table(&self) -> String;

    /// Check that the store has the structure this source expects.
    fn check(&self) -> Result<bool, SourceError>;

    /// Descriptions of the requested series present in the store.
    fn describe(&self) -> Result<Vec<SeriesDescription>, SourceError>;

    /// Transform steps applied to every produced frame.
    fn prepare(&self) -> &[PrepareStep];

    fn set_prepare(&mut self, steps: Vec<PrepareStep>);

    /// Read the store, pivot to wide form, apply the prepare steps and cache
    /// the result.
    fn make_frame(&mut self) -> Result<&DataFrame, SourceError>;

    /// The frame cached by the last [`SeriesSource::make_frame`].
    fn frame(&self) -> Result<&DataFrame, SourceError>;

    /// Requested codes that the produced frame does not contain.
    fn missing_codes(&self) -> Result<Vec<String>, SourceError> {
        Ok(missing_codes(self.codes(), self.frame()?))
    }
}

impl fmt::Display for dyn SeriesSource + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\n    data from {},\n    row type {},\n    data source {}",
            self.name(),
            self.kind(),
            self.row_type(),
            self.path().display()
        )
    }
}

/// State shared by every source implementation.
#[derive(Debug)]
pub(crate) struct SourceState {
    pub path: PathBuf,
    pub row_type: RowType,
    pub codes: Vec<String>,
    pub prepare: Vec<PrepareStep>,
    pub frame: Option<DataFrame>,
}

impl SourceState {
    /// Fails if `path` is not an existing file or a code is the reserved
    /// `date` index name. Duplicate codes are dropped, first occurrence kept.
    pub fn new<I, S>(path: impl Into<PathBuf>, row_type: RowType, codes: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.into();
        if !path.is_file() {
            return Err(SourceError::NotFound { path });
        }

        let mut seen = HashSet::new();
        let codes: Vec<String> = codes
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| seen.insert(c.clone()))
            .collect();
        check_codes(&codes)?;

        Ok(Self {
            path,
            row_type,
            codes,
            prepare: Vec::new(),
            frame: None,
        })
    }

    pub fn frame(&self) -> Result<&DataFrame, SourceError> {
        self.frame.as_ref().ok_or(SourceError::FrameNotLoaded)
    }

    /// Cache a freshly produced frame and report what it covers.
    pub fn store_frame(&mut self, frame: DataFrame) -> &DataFrame {
        let missing = missing_codes(&self.codes, &frame);
        info!(
            path = %self.path.display(),
            row_type = %self.row_type,
            rows = frame.height(),
            series = frame.width().saturating_sub(1),
            "frame loaded"
        );
        if !missing.is_empty() {
            warn!(
                path = %self.path.display(),
                missing = ?missing,
                "requested codes not in source"
            );
        }
        self.frame.insert(frame)
    }
}
