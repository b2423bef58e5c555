//! Entity-identifier harmonization.
//!
//! Every source must resolve to the same canonical entity names before any
//! cross-source merge; an explicit finite crosswalk is the single source of
//! truth for that resolution. Values absent from the crosswalk are left in
//! place and flagged in the report, so the caller can detect coverage gaps
//! instead of discovering them as empty join results.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use polars::prelude::*;

use crate::error::{PanelError, Result};

/// An explicit `old identifier -> canonical identifier` crosswalk.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    map: BTreeMap<String, String>,
}

impl EntityMap {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            map: pairs
                .into_iter()
                .map(|(old, canonical)| (old.to_string(), canonical.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.map.get(identifier).map(String::as_str)
    }
}

/// Coverage of an alignment pass.
#[derive(Debug, Clone, Default)]
pub struct AlignReport {
    /// Distinct identifiers with no crosswalk entry, left unmapped.
    pub unmapped: BTreeSet<String>,
    /// Rows whose identifier was rewritten.
    pub remapped: usize,
}

/// Rewrite `column` through the crosswalk, producing a new table.
pub fn align_entities(
    df: &DataFrame,
    column: &str,
    map: &EntityMap,
) -> Result<(DataFrame, AlignReport)> {
    let identifiers = df
        .column(column)
        .map_err(|_| PanelError::SchemaMismatch {
            table: "long table".to_string(),
            column: column.to_string(),
        })?
        .str()?;

    let mut report = AlignReport::default();
    let rewritten: Vec<Option<String>> = identifiers
        .into_iter()
        .map(|value| {
            value.map(|v| match map.get(v) {
                Some(canonical) => {
                    report.remapped += 1;
                    canonical.to_string()
                }
                None => {
                    report.unmapped.insert(v.to_string());
                    v.to_string()
                }
            })
        })
        .collect();

    if !report.unmapped.is_empty() {
        warn!(
            "entity column '{column}' has {} identifier(s) with no crosswalk entry: {:?}",
            report.unmapped.len(),
            report.unmapped
        );
    }

    let mut aligned = df.clone();
    aligned.replace(column, Series::new(column, rewritten))?;
    Ok((aligned, report))
}
