//! Series descriptions and the seasonal-adjustment parameters stored with them.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Metadata for one series present in a store.
///
/// Which optional fields are filled depends on the store: the database
/// carries `code`, `group_id`, `name`, `unit`, `source` and `params`; the
/// legacy sheet layout carries `code`, `name`, `unit`; the current layout
/// carries `code`, `name`, `source`, `kind`, `database`, `unit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesDescription {
    pub code2: String,
    pub code: Option<i64>,
    pub group_id: Option<i64>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub source: Option<String>,
    /// Variable type column of the current sheet layout.
    pub kind: Option<String>,
    /// Originating database column of the current sheet layout.
    pub database: Option<String>,
    /// Raw JSON from the `params` column.
    pub params: Option<String>,
}

impl SeriesDescription {
    pub fn new(code2: impl Into<String>) -> Self {
        Self {
            code2: code2.into(),
            ..Default::default()
        }
    }

    /// Seasonal-adjustment parameters decoded from `params`.
    pub fn season(&self) -> SeasonParams {
        SeasonParams::parse(self.params.as_deref())
    }
}

/// Render descriptions as a table, one row per series keyed by `code2`.
pub fn descriptions_frame(descriptions: &[SeriesDescription]) -> PolarsResult<DataFrame> {
    fn text(name: &str, values: impl Iterator<Item = Option<String>>) -> Column {
        Column::new(name.into(), values.collect::<Vec<_>>())
    }

    DataFrame::new(vec![
        Column::new(
            "code2".into(),
            descriptions.iter().map(|d| d.code2.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "code".into(),
            descriptions.iter().map(|d| d.code).collect::<Vec<_>>(),
        ),
        Column::new(
            "group_id".into(),
            descriptions.iter().map(|d| d.group_id).collect::<Vec<_>>(),
        ),
        text("name", descriptions.iter().map(|d| d.name.clone())),
        text("unit", descriptions.iter().map(|d| d.unit.clone())),
        text("source", descriptions.iter().map(|d| d.source.clone())),
        text("type", descriptions.iter().map(|d| d.kind.clone())),
        text("bd", descriptions.iter().map(|d| d.database.clone())),
        text("params", descriptions.iter().map(|d| d.params.clone())),
    ])
}

/// Seasonal-adjustment settings kept under the `SEASON` key of `params`.
///
/// Layout: `{"SEASON": {"working": "<method>", "<method>": {...}, ...}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonParams {
    working: Option<String>,
    methods: Map<String, Value>,
}

impl SeasonParams {
    /// Decode the raw column value. Missing or unreadable JSON gives empty
    /// parameters with no working method.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unreadable seasonal params, using defaults");
                return Self::default();
            }
        };

        let Some(season) = value.get("SEASON").and_then(Value::as_object) else {
            return Self::default();
        };

        let working = season
            .get("working")
            .and_then(Value::as_str)
            .filter(|w| !w.is_empty() && !w.eq_ignore_ascii_case("none"))
            .map(str::to_string);

        let methods = season
            .iter()
            .filter(|(k, _)| k.as_str() != "working")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self { working, methods }
    }

    /// Name of the method currently used for decomposition.
    pub fn working(&self) -> Option<&str> {
        self.working.as_deref()
    }

    /// Parameters of the working method, if both are set.
    pub fn working_params(&self) -> Option<&Map<String, Value>> {
        self.working
            .as_deref()
            .and_then(|w| self.methods.get(w))
            .and_then(Value::as_object)
    }

    /// Parameters saved for `method`; empty when none were saved.
    pub fn method_params(&self, method: &str) -> Map<String, Value> {
        self.methods
            .get(method)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}
