//! Error types.
//!
//! Issues that affect only a subset of rows (an unparseable year label, a
//! guard-filtered observation, an unmapped identifier) are recovered locally
//! by the stage that hits them and surface as counts in that stage's report.
//! The variants here are the fatal ones: anything that makes a table's
//! meaning ambiguous stops the run and names the offending key or column.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PanelError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("table '{table}' is missing expected column '{column}'")]
    SchemaMismatch { table: String, column: String },
    #[error("no four-digit period in column label '{0}'")]
    PeriodParse(String),
    #[error("duplicate merge key {key} in {side} table")]
    NonUniqueKey { side: String, key: String },
    #[error("column '{0}' appears on both sides of a merge; supply a rename or suffix rule")]
    ColumnCollision(String),
    #[error("derivation '{rule}' dropped {dropped} of {total} rows, above the strict limit of {limit}")]
    DomainViolation {
        rule: String,
        dropped: usize,
        total: usize,
        limit: f64,
    },
    #[error("requested output column '{0}' is not present in the panel")]
    ColumnMissing(String),
    #[error("acquisition request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("wrapped polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
    #[error("wrapped UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("wrapped IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PanelError>;
