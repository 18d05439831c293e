//! Priority merge of wide frames from several row types.
//!
//! Frames are layered FACT → EXOG_R → EXOG_P → MODEL: each later frame only
//! fills cells that every earlier one left missing. Each row type may appear
//! at most once.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{SeriesSource, SourceError};
use crate::domain::RowType;
use crate::frame::{combine_first, empty_frame};

#[derive(Debug, Error)]
pub enum CombineError {
    /// Every `(row type, input position)` pair whose row type is shared.
    #[error("row types must be unique, got duplicates: {}", format_duplicates(.0))]
    DuplicateRowType(Vec<(RowType, usize)>),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

fn format_duplicates(pairs: &[(RowType, usize)]) -> String {
    pairs
        .iter()
        .map(|(rt, i)| format!("{rt} at {i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Positions of inputs sharing a row type, grouped by row type and sorted.
fn duplicate_row_types(row_types: impl IntoIterator<Item = RowType>) -> Vec<(RowType, usize)> {
    let mut by_type: BTreeMap<RowType, Vec<usize>> = BTreeMap::new();
    for (i, rt) in row_types.into_iter().enumerate() {
        by_type.entry(rt).or_default().push(i);
    }
    by_type
        .into_iter()
        .filter(|(_, positions)| positions.len() > 1)
        .flat_map(|(rt, positions)| positions.into_iter().map(move |i| (rt, i)))
        .collect()
}

/// Merge labelled frames by row-type priority.
///
/// Zero inputs give an empty frame.
pub fn combine_frames(inputs: Vec<(RowType, DataFrame)>) -> Result<DataFrame, CombineError> {
    let duplicates = duplicate_row_types(inputs.iter().map(|(rt, _)| *rt));
    if !duplicates.is_empty() {
        return Err(CombineError::DuplicateRowType(duplicates));
    }

    let mut inputs = inputs;
    inputs.sort_by_key(|(rt, _)| rt.priority());

    let mut merged = empty_frame();
    for (rt, frame) in &inputs {
        merged = combine_first(&merged, frame)?;
        debug!(row_type = %rt, rows = merged.height(), columns = merged.width(), "layer merged");
    }
    Ok(merged)
}

/// Load every source and merge the frames by row-type priority.
///
/// Duplicate row types are rejected before any source is read. Sources are
/// loaded in priority order, not input order.
pub fn combine_sources(sources: &mut [Box<dyn SeriesSource>]) -> Result<DataFrame, CombineError> {
    let duplicates = duplicate_row_types(sources.iter().map(|s| s.row_type()));
    if !duplicates.is_empty() {
        return Err(CombineError::DuplicateRowType(duplicates));
    }

    let mut order: Vec<usize> = (0..sources.len()).collect();
    order.sort_by_key(|&i| sources[i].row_type().priority());

    let mut merged = empty_frame();
    for i in order {
        let source = &mut sources[i];
        let frame = source.make_frame()?;
        merged = combine_first(&merged, frame)?;
    }
    info!(
        sources = sources.len(),
        rows = merged.height(),
        series = merged.width().saturating_sub(1),
        "working frame combined"
    );
    Ok(merged)
}
