use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provenance of a loaded series.
///
/// Decides merge priority when frames are combined and, for spreadsheets,
/// which sheet layout is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowType {
    /// Observed values.
    Fact = 0,
    /// Exogenous parameters, set by hand.
    ExogP = 1,
    /// Exogenous series.
    ExogR = 2,
    /// Outputs of other models.
    Model = 3,
}

impl RowType {
    pub const ALL: [RowType; 4] = [RowType::Fact, RowType::ExogP, RowType::ExogR, RowType::Model];

    /// Merge order: earlier entries win when several frames hold a value.
    pub const PRIORITY: [RowType; 4] =
        [RowType::Fact, RowType::ExogR, RowType::ExogP, RowType::Model];

    pub fn name(self) -> &'static str {
        match self {
            RowType::Fact => "FACT",
            RowType::ExogP => "EXOG_P",
            RowType::ExogR => "EXOG_R",
            RowType::Model => "MODEL",
        }
    }

    /// Position in [`RowType::PRIORITY`]; lower merges first.
    pub fn priority(self) -> usize {
        match self {
            RowType::Fact => 0,
            RowType::ExogR => 1,
            RowType::ExogP => 2,
            RowType::Model => 3,
        }
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FACT" => Ok(RowType::Fact),
            "EXOG_P" => Ok(RowType::ExogP),
            "EXOG_R" => Ok(RowType::ExogR),
            "MODEL" => Ok(RowType::Model),
            other => Err(format!(
                "unknown row type '{other}' (expected FACT, EXOG_R, EXOG_P or MODEL)"
            )),
        }
    }
}

/// Physical store a source reads from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "SQLITE")]
    Sqlite,
    #[serde(alias = "EXCEL")]
    Excel,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Sqlite => "SQLITE",
            SourceKind::Excel => "EXCEL",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
