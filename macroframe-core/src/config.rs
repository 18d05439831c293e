//! Working-frame manifests.
//!
//! A manifest is a TOML file naming the stores that make up one working
//! frame, the codes read from each, and the prepare steps applied before
//! and after the merge. Relative store paths resolve against the
//! manifest's directory.

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::combine::{combine_sources, CombineError};
use crate::data::{DbSource, ExcelSource, SeriesSource, SheetSelector, SourceError, StoreSchema};
use crate::domain::{RowType, SourceKind};
use crate::prepare::{apply_steps, PrepareStep};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid manifest: {0}")]
    Invalid(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Combine(#[from] CombineError),
}

/// One store entry of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
    pub row_type: RowType,
    pub codes: Vec<String>,
    #[serde(default)]
    pub prepare: Vec<PrepareStep>,
    /// Excel only; defaults to the `YEAR` sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<SheetSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Table names shared by every SQLite store.
    #[serde(default)]
    pub store: StoreSchema,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
    /// Steps applied to the merged frame.
    #[serde(default)]
    pub post_prepare: Vec<PrepareStep>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// A merged working frame and the sources it was built from.
pub struct WorkFrame {
    pub frame: DataFrame,
    /// Requested codes each source did not have, in manifest order.
    pub missing: Vec<(RowType, Vec<String>)>,
    pub sources: Vec<Box<dyn SeriesSource>>,
}

impl Manifest {
    /// Load a manifest; relative store paths resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::from_toml(&content)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Parse a manifest whose relative paths resolve against the current
    /// directory.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate_names()?;
        for (i, source) in self.sources.iter().enumerate() {
            if source.codes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {i} ({}) requests no codes",
                    source.path.display()
                )));
            }
            if source.kind == SourceKind::Sqlite && source.sheet.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "source {i} ({}) is sqlite but names a sheet",
                    source.path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Open every store with its prepare steps attached. Nothing is read yet.
    pub fn open_sources(&self) -> Result<Vec<Box<dyn SeriesSource>>, ConfigError> {
        self.sources
            .iter()
            .map(|cfg| -> Result<Box<dyn SeriesSource>, ConfigError> {
                let path = self.resolve(&cfg.path);
                let codes = cfg.codes.iter().cloned();
                let mut source: Box<dyn SeriesSource> = match cfg.kind {
                    SourceKind::Sqlite => Box::new(DbSource::with_schema(
                        path,
                        cfg.row_type,
                        codes,
                        self.store.clone(),
                    )?),
                    SourceKind::Excel => Box::new(ExcelSource::with_sheet(
                        path,
                        cfg.row_type,
                        codes,
                        cfg.sheet.clone().unwrap_or_default(),
                    )?),
                };
                source.set_prepare(cfg.prepare.clone());
                Ok(source)
            })
            .collect()
    }

    /// Read every store, merge by row-type priority and apply the
    /// post-merge steps.
    pub fn build(&self) -> Result<WorkFrame, ConfigError> {
        let mut sources = self.open_sources()?;
        let merged = combine_sources(&mut sources)?;
        let frame = apply_steps(merged, &self.post_prepare)?;

        let missing = sources
            .iter()
            .map(|s| s.missing_codes().map(|codes| (s.row_type(), codes)))
            .collect::<Result<Vec<_>, SourceError>>()?;

        info!(
            sources = sources.len(),
            rows = frame.height(),
            series = frame.width().saturating_sub(1),
            "working frame built"
        );
        Ok(WorkFrame {
            frame,
            missing,
            sources,
        })
    }
}
