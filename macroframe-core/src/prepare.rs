//! Column transforms applied to a produced frame before it is handed out.
//!
//! Steps run in the order given; each touches only the columns it names.
//! Missing values stay missing.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::source::SourceError;
use crate::frame::{column_values, series_columns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepareOp {
    /// Multiply by `value`.
    Scale,
    /// Add `value`.
    Add,
}

/// One transform over a set of frame columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareStep {
    pub op: PrepareOp,
    pub columns: Vec<String>,
    pub value: f64,
}

impl PrepareStep {
    pub fn scale<I, S>(columns: I, multiplier: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op: PrepareOp::Scale,
            columns: columns.into_iter().map(Into::into).collect(),
            value: multiplier,
        }
    }

    pub fn add<I, S>(columns: I, term: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op: PrepareOp::Add,
            columns: columns.into_iter().map(Into::into).collect(),
            value: term,
        }
    }

    fn apply_value(&self, v: f64) -> f64 {
        match self.op {
            PrepareOp::Scale => v * self.value,
            PrepareOp::Add => v + self.value,
        }
    }
}

/// Run `steps` over `df` in order.
///
/// A step naming a column that is not a series column of `df` fails with
/// [`SourceError::UnknownColumn`].
pub fn apply_steps(mut df: DataFrame, steps: &[PrepareStep]) -> Result<DataFrame, SourceError> {
    if steps.is_empty() {
        return Ok(df);
    }

    let available = series_columns(&df);
    for step in steps {
        for name in &step.columns {
            if !available.contains(name) {
                return Err(SourceError::UnknownColumn {
                    column: name.clone(),
                });
            }
            let values: Vec<Option<f64>> = column_values(&df, name)?
                .into_iter()
                .map(|v| v.map(|x| step.apply_value(x)))
                .collect();
            df.with_column(Column::new(name.as_str().into(), values))?;
        }
        debug!(op = ?step.op, value = step.value, columns = ?step.columns, "prepare step applied");
    }

    Ok(df)
}
