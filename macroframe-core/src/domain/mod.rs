//! Domain types for macroframe

pub mod kinds;
pub mod series;

pub use kinds::{RowType, SourceKind};
pub use series::{descriptions_frame, SeasonParams, SeriesDescription};
