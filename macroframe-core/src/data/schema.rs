use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::source::SourceError;

/// Columns of the facts table.
pub const DATA_COLUMNS: [&str; 3] = ["code", "date", "value"];

/// Columns of the descriptions table.
pub const HEADER_COLUMNS: [&str; 7] = ["code", "mgroup_id", "name", "unit", "code2", "source", "params"];

/// Table names of a series database.
///
/// The facts table holds `(code, date, value)` rows keyed by the integer
/// series key; the descriptions table maps that key to the `code2` series
/// code and its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSchema {
    pub data_table: String,
    pub header_table: String,
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self {
            data_table: "datas".into(),
            header_table: "headers".into(),
        }
    }
}

impl StoreSchema {
    pub fn new(data_table: impl Into<String>, header_table: impl Into<String>) -> Result<Self, SourceError> {
        let schema = Self {
            data_table: data_table.into(),
            header_table: header_table.into(),
        };
        schema.validate_names()?;
        Ok(schema)
    }

    /// Table names are spliced into SQL text, so only plain identifiers pass.
    pub fn validate_names(&self) -> Result<(), SourceError> {
        for name in [&self.data_table, &self.header_table] {
            let mut chars = name.chars();
            let valid = chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(SourceError::InvalidInput(format!(
                    "table name '{name}' is not a plain identifier"
                )));
            }
        }
        Ok(())
    }

    /// Long-format observations for `n` requested codes, bound as `?1..?n`.
    pub fn data_query(&self, n: usize) -> String {
        let (d, h) = (&self.data_table, &self.header_table);
        format!(
            "SELECT {d}.date, {d}.value, {h}.code2 FROM {d} JOIN {h} ON {d}.code = {h}.code \
             WHERE {h}.code2 IN ({})",
            placeholders(n)
        )
    }

    /// Description rows for `n` requested codes, bound as `?1..?n`.
    pub fn header_query(&self, n: usize) -> String {
        format!(
            "SELECT code, code2, mgroup_id, name, unit, source, params FROM {} WHERE code2 IN ({})",
            self.header_table,
            placeholders(n)
        )
    }

    /// True when both tables exist with exactly the expected column sets.
    pub fn validate(&self, conn: &Connection) -> Result<bool, SourceError> {
        self.validate_names()?;
        let data_ok = table_columns(conn, &self.data_table)? == expected(&DATA_COLUMNS);
        let header_ok = table_columns(conn, &self.header_table)? == expected(&HEADER_COLUMNS);
        Ok(data_ok && header_ok)
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn expected(columns: &[&str]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Column names of `table`; empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>, SourceError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}
