//! Series stores and the readers over them

pub mod excel;
pub mod schema;
pub mod source;
pub mod sqlite;

pub use excel::{ExcelSource, SheetLayout, SheetSelector};
pub use schema::StoreSchema;
pub use source::{Observation, SeriesSource, SourceError};
pub use sqlite::DbSource;
