//! Persisting the final panel.
//!
//! The writer's only responsibility is a UTF-8 delimited text artifact with a
//! header row and the exact column order the caller asked for. Path creation
//! and compression are collaborator concerns and do not live here.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

/// Trait to define different output generators. `save` serializes the
/// `DataFrame` into a writer; `format` renders it to a string.
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;
        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters, one for each potential output type.
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    Csv(CsvFormatter),
}

/// Format the results as a CSV file, optionally with a fixed column order.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CsvFormatter {
    /// When set, the artifact carries exactly these columns in this order.
    pub columns: Option<Vec<String>>,
}

impl CsvFormatter {
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl OutputGenerator for CsvFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        let mut ordered = match self.columns.as_ref() {
            Some(columns) => {
                for column in columns {
                    if !df.get_column_names().iter().any(|c| *c == column.as_str()) {
                        return Err(PanelError::ColumnMissing(column.clone()));
                    }
                }
                df.select(columns)?
            }
            None => df.clone(),
        };
        CsvWriter::new(writer).finish(&mut ordered)?;
        Ok(())
    }
}

/// Column order for a panel whose trailing columns vary with the source
/// transcription: the `prefix` columns that exist come first, in the given
/// order, followed by the remaining columns in table order.
pub fn ordered_with_prefix(df: &DataFrame, prefix: &[&str]) -> Vec<String> {
    let existing: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let mut ordered: Vec<String> = prefix
        .iter()
        .filter(|name| existing.iter().any(|c| c.as_str() == **name))
        .map(|name| name.to_string())
        .collect();
    ordered.extend(
        existing
            .into_iter()
            .filter(|name| !prefix.contains(&name.as_str())),
    );
    ordered
}

/// Write `df` to `path` with the given formatter.
pub fn write_panel<T: OutputGenerator>(path: &Path, df: &mut DataFrame, formatter: &T) -> Result<()> {
    let mut file = File::create(path)?;
    formatter.save(&mut file, df)
}
