//! Key-checked equi-joins between long tables.
//!
//! Panel integrity requires one observation per entity-period, so a duplicate
//! key on either side is fatal rather than silently fanning out rows.
//! Likewise a non-key column present on both sides is fatal unless the caller
//! supplies an explicit rename or suffix rule; the right side is never
//! silently overwritten or auto-suffixed.

use itertools::Itertools;
use log::debug;
use nonempty::NonEmpty;
use polars::lazy::dsl::len;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

const KEY_COUNT: &str = "__key_count";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(value: JoinKind) -> Self {
        match value {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        }
    }
}

/// What to do when a non-key column name appears on both sides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum CollisionPolicy {
    /// Fail loudly, naming the column.
    #[default]
    Error,
    /// Append this suffix to the colliding right-side columns.
    Suffix(String),
    /// Rename right-side columns `(old, new)` before joining.
    Rename(Vec<(String, String)>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeOptions {
    pub kind: JoinKind,
    pub collision: CollisionPolicy,
}

impl MergeOptions {
    pub fn inner() -> Self {
        Self::default()
    }

    pub fn left() -> Self {
        Self {
            kind: JoinKind::Left,
            ..Self::default()
        }
    }
}

fn require_keys(df: &DataFrame, side: &str, keys: &[&str]) -> Result<()> {
    for key in keys {
        if !df.get_column_names().iter().any(|c| c == key) {
            return Err(PanelError::SchemaMismatch {
                table: format!("{side} table"),
                column: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Error with the first duplicated key tuple, if any.
fn check_unique(df: &DataFrame, side: &str, keys: &[&str]) -> Result<()> {
    let duplicates = df
        .select(keys.iter().copied())?
        .lazy()
        .group_by_stable(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([len().alias(KEY_COUNT)])
        .filter(col(KEY_COUNT).gt(lit(1u32)))
        .collect()?;
    if duplicates.height() > 0 {
        let offending = duplicates
            .get(0)
            .map(|row| {
                row.iter()
                    .take(keys.len())
                    .map(|value| value.to_string())
                    .join(", ")
            })
            .unwrap_or_default();
        return Err(PanelError::NonUniqueKey {
            side: side.to_string(),
            key: format!("({offending})"),
        });
    }
    Ok(())
}

fn colliding_columns(left: &DataFrame, right: &DataFrame, keys: &[&str]) -> Vec<String> {
    let left_columns: Vec<String> = left
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    right
        .get_column_names()
        .into_iter()
        .filter(|name| !keys.contains(name))
        .filter(|name| left_columns.iter().any(|l| l.as_str() == *name))
        .map(|name| name.to_string())
        .collect()
}

/// Equi-join two long tables on `keys`.
pub fn merge(
    left: &DataFrame,
    right: &DataFrame,
    keys: &NonEmpty<String>,
    options: &MergeOptions,
) -> Result<DataFrame> {
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    require_keys(left, "left", &key_refs)?;
    require_keys(right, "right", &key_refs)?;
    check_unique(left, "left", &key_refs)?;
    check_unique(right, "right", &key_refs)?;

    let mut right = right.clone();
    match &options.collision {
        CollisionPolicy::Error => {}
        CollisionPolicy::Suffix(suffix) => {
            for column in colliding_columns(left, &right, &key_refs) {
                right.rename(&column, &format!("{column}{suffix}"))?;
            }
        }
        CollisionPolicy::Rename(pairs) => {
            for (old, new) in pairs {
                if !right.get_column_names().iter().any(|c| *c == old.as_str()) {
                    return Err(PanelError::ColumnMissing(old.clone()));
                }
                right.rename(old, new)?;
            }
        }
    }
    if let Some(collision) = colliding_columns(left, &right, &key_refs).first() {
        return Err(PanelError::ColumnCollision(collision.clone()));
    }

    debug!(
        "merging {:?} x {:?} on {:?} ({:?})",
        left.shape(),
        right.shape(),
        key_refs,
        options.kind
    );
    let joined = left.join(
        &right,
        key_refs.clone(),
        key_refs,
        JoinArgs::new(options.kind.into()),
    )?;
    Ok(joined)
}
