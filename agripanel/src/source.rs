//! Reading of raw CSV sources into normalized dataframes.
//!
//! Each source is described declaratively by a [`SourceSpec`]: which file to
//! read under the configured base directory, which column identifies the
//! entity, and the filters to apply (entity allow-list, category equality,
//! column-name exclusion). Reading has no side effects beyond the file read.

use std::path::Path;

use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PanelError, Result};

/// Declarative description of a raw CSV source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Filename, resolved against `Config::base_path`.
    pub filename: String,
    /// Column holding the entity identifier (country, province, ...).
    pub entity_column: String,
    /// Entity allow-list. Empty means no entity filtering.
    pub entities: Vec<String>,
    /// Optional `(column, value)` equality filter, e.g. `("Element", "Production")`.
    pub category: Option<(String, String)>,
    /// Drop every column whose name contains this substring, e.g. `"Code"`.
    pub exclude_columns_containing: Option<String>,
}

/// Read a CSV file into a dataframe, without any filtering.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PanelError::SourceNotFound(path.to_path_buf()));
    }
    info!("Attempting to load dataframe from {}", path.display());
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn require_column(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    if df.get_column_names().iter().any(|name| *name == column) {
        Ok(())
    } else {
        Err(PanelError::SchemaMismatch {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

/// Load a source and apply its declared filters.
pub fn read_source(config: &Config, spec: &SourceSpec) -> Result<DataFrame> {
    let path = config.source_path(&spec.filename);
    let df = read_csv(&path)?;

    require_column(&df, &spec.filename, &spec.entity_column)?;
    if let Some((column, _)) = spec.category.as_ref() {
        require_column(&df, &spec.filename, column)?;
    }

    let mut lazy = df.lazy();
    if !spec.entities.is_empty() {
        let allowed = Series::new("entities", spec.entities.clone());
        lazy = lazy.filter(col(&spec.entity_column).is_in(lit(allowed)));
    }
    if let Some((column, value)) = spec.category.as_ref() {
        lazy = lazy.filter(col(column).eq(lit(value.clone())));
    }
    let mut df = lazy.collect()?;

    if let Some(pattern) = spec.exclude_columns_containing.as_ref() {
        let keep: Vec<String> = df
            .get_column_names()
            .iter()
            .filter(|name| !name.contains(pattern.as_str()))
            .map(|name| name.to_string())
            .collect();
        df = df.select(keep)?;
    }

    info!(
        "Loaded source {} with shape {:?}",
        spec.filename,
        df.shape()
    );
    Ok(df)
}
