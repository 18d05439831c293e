//! Macroframe core: loading macroeconomic series into year-indexed frames.
//!
//! This crate contains:
//! - Domain types (row types, source kinds, series descriptions)
//! - Series sources over SQLite stores and Excel workbooks
//! - Pivoting long observations into wide frames
//! - Prepare steps (scale/add) over frame columns
//! - Priority merge of FACT, EXOG_R, EXOG_P and MODEL frames
//! - TOML manifests describing a full working frame
//! - CSV export, frame fingerprints and update stamps

pub mod combine;
pub mod config;
pub mod data;
pub mod domain;
pub mod export;
pub mod frame;
pub mod prepare;
pub mod stamp;

pub use combine::{combine_frames, combine_sources, CombineError};
pub use config::{ConfigError, Manifest, SourceConfig, WorkFrame};
pub use data::{DbSource, ExcelSource, SeriesSource, SheetSelector, SourceError, StoreSchema};
pub use domain::{RowType, SeriesDescription, SourceKind};
pub use frame::{combine_first, frame_fingerprint, pivot};
pub use prepare::{apply_steps, PrepareStep};
