//! Wide-to-long reshaping.
//!
//! A wide source carries one column per year (`Y1994`, `2005年`, plain
//! `1994`). The melt emits one row per input row and value column, with the
//! period label normalized to the first four-digit run found in the column
//! name. A label with no four-digit run drops that column's rows; the drop is
//! logged and counted so completeness can be audited, never default-filled.

use log::warn;
use polars::prelude::*;
use regex::Regex;

use crate::error::{PanelError, Result};

const YEAR_PATTERN: &str = r"\d{4}";

/// Counts of what the melt had to discard.
#[derive(Debug, Clone, Default)]
pub struct ReshapeReport {
    /// Column labels with no parseable four-digit period.
    pub dropped_labels: Vec<String>,
    /// Rows lost to the dropped labels.
    pub dropped_rows: usize,
}

/// Columns of `df` that carry a four-digit period in their name, minus any
/// explicitly excluded identifiers.
pub fn year_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    let year_re = Regex::new(YEAR_PATTERN).unwrap();
    df.get_column_names()
        .iter()
        .filter(|name| !exclude.contains(name) && year_re.is_match(name))
        .map(|name| name.to_string())
        .collect()
}

fn parse_period(label: &str) -> Option<i32> {
    let year_re = Regex::new(YEAR_PATTERN).unwrap();
    year_re
        .find(label)
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        if !df.get_column_names().iter().any(|c| c == name) {
            return Err(PanelError::SchemaMismatch {
                table: "wide table".to_string(),
                column: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Melt `value_cols` into a long table with columns
/// `(id_cols..., year_column, value_column)`.
///
/// Output row count = input rows × parseable value columns. The year column
/// is emitted as `i32`, the value column as `f64`.
pub fn wide_to_long(
    df: &DataFrame,
    id_cols: &[&str],
    value_cols: &[&str],
    year_column: &str,
    value_column: &str,
) -> Result<(DataFrame, ReshapeReport)> {
    require_columns(df, id_cols)?;
    require_columns(df, value_cols)?;

    let mut report = ReshapeReport::default();
    let mut pieces: Vec<LazyFrame> = Vec::with_capacity(value_cols.len());
    for label in value_cols {
        match parse_period(label) {
            Some(year) => {
                let mut exprs: Vec<Expr> = id_cols.iter().map(|c| col(*c)).collect();
                exprs.push(lit(year).alias(year_column));
                exprs.push(col(*label).cast(DataType::Float64).alias(value_column));
                pieces.push(df.clone().lazy().select(exprs));
            }
            None => {
                warn!("dropping value column '{label}': no four-digit period in its label");
                report.dropped_rows += df.height();
                report.dropped_labels.push(label.to_string());
            }
        }
    }

    if pieces.is_empty() {
        return Err(PanelError::PeriodParse(
            report
                .dropped_labels
                .first()
                .cloned()
                .unwrap_or_default(),
        ));
    }

    let long = concat(pieces, UnionArgs::default())?.collect()?;
    Ok((long, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_df() -> DataFrame {
        df!(
            "Entity" => &["Japan", "Germany"],
            "Y2000" => &[10.0, 5.0],
            "Y2001" => &[20.0, 15.0],
        )
        .unwrap()
    }

    #[test]
    fn melt_emits_one_row_per_entity_and_year() {
        let (long, report) =
            wide_to_long(&wide_df(), &["Entity"], &["Y2000", "Y2001"], "Year", "Value").unwrap();
        assert_eq!(long.height(), 4);
        assert_eq!(report.dropped_rows, 0);

        let sorted = long
            .sort(["Entity", "Year"], SortMultipleOptions::default())
            .unwrap();
        let expected = df!(
            "Entity" => &["Germany", "Germany", "Japan", "Japan"],
            "Year" => &[2000i32, 2001, 2000, 2001],
            "Value" => &[5.0, 15.0, 10.0, 20.0],
        )
        .unwrap();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn unparseable_labels_are_dropped_and_counted() {
        let df = df!(
            "Entity" => &["Japan", "Germany"],
            "Y2000" => &[10.0, 5.0],
            "Total" => &[30.0, 20.0],
        )
        .unwrap();
        let (long, report) =
            wide_to_long(&df, &["Entity"], &["Y2000", "Total"], "Year", "Value").unwrap();
        assert_eq!(long.height(), 2);
        assert_eq!(report.dropped_labels, vec!["Total".to_string()]);
        assert_eq!(report.dropped_rows, 2);
    }

    #[test]
    fn no_parseable_label_at_all_is_an_error() {
        let df = df!(
            "Entity" => &["Japan"],
            "Total" => &[30.0],
        )
        .unwrap();
        let err = wide_to_long(&df, &["Entity"], &["Total"], "Year", "Value").unwrap_err();
        assert!(matches!(err, PanelError::PeriodParse(label) if label == "Total"));
    }

    #[test]
    fn label_styles_with_prefix_and_suffix_both_parse() {
        assert_eq!(parse_period("Y1994"), Some(1994));
        assert_eq!(parse_period("2005年"), Some(2005));
        assert_eq!(parse_period("1994"), Some(1994));
        assert_eq!(parse_period("Total"), None);
    }

    #[test]
    fn year_columns_skips_identifiers() {
        let df = df!(
            "Entity" => &["Japan"],
            "Code" => &["JPN"],
            "2000" => &[1.0],
            "2001" => &[2.0],
        )
        .unwrap();
        assert_eq!(year_columns(&df, &["Entity", "Code"]), vec!["2000", "2001"]);
    }
}
