//! Descriptive statistics over a panel, and the design-matrix hand-off to an
//! external regression engine.

use polars::lazy::dsl::len;
use polars::prelude::*;

use crate::column_names as COL;
use crate::error::{PanelError, Result};

/// Per-column missing rate, sorted worst-first.
pub fn missing_rate(df: &DataFrame) -> Result<DataFrame> {
    let height = df.height();
    let mut names: Vec<String> = Vec::with_capacity(df.width());
    let mut rates: Vec<f64> = Vec::with_capacity(df.width());
    for series in df.get_columns() {
        names.push(series.name().to_string());
        rates.push(if height == 0 {
            0.0
        } else {
            series.null_count() as f64 / height as f64
        });
    }
    let out = df!(
        COL::SUMMARY_COLUMN => names,
        COL::MISSING_RATE => rates,
    )?;
    Ok(out.sort(
        [COL::MISSING_RATE],
        SortMultipleOptions::default().with_order_descending(true),
    )?)
}

/// Observation counts per year, in year order.
pub fn year_counts(df: &DataFrame, year_column: &str) -> Result<DataFrame> {
    if !df.get_column_names().iter().any(|c| *c == year_column) {
        return Err(PanelError::ColumnMissing(year_column.to_string()));
    }
    Ok(df
        .clone()
        .lazy()
        .group_by_stable([col(year_column)])
        .agg([len().alias(COL::OBSERVATIONS)])
        .collect()?
        .sort([year_column], SortMultipleOptions::default())?)
}

/// Select the modeled columns and drop every row with a missing value in any
/// of them. The contract with the external regression engine is a clean
/// design matrix, so missing values must not leak through.
pub fn design_matrix(df: &DataFrame, regressors: &[&str], target: &str) -> Result<DataFrame> {
    let mut modeled: Vec<&str> = regressors.to_vec();
    modeled.push(target);
    for column in &modeled {
        if !df.get_column_names().iter().any(|c| c == column) {
            return Err(PanelError::ColumnMissing(column.to_string()));
        }
    }

    let guards: Vec<Expr> = modeled.iter().map(|c| col(*c).is_not_null()).collect();
    let mut lazy = df.clone().lazy();
    if let Some(guard) = guards.into_iter().reduce(|acc, expr| acc.and(expr)) {
        lazy = lazy.filter(guard);
    }
    Ok(lazy
        .select(modeled.iter().map(|c| col(*c)).collect::<Vec<_>>())
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> DataFrame {
        df!(
            "Country" => &["Japan", "Japan", "Germany", "Germany"],
            "Year" => &[2000i32, 2001, 2000, 2001],
            "Temp" => &[Some(15.0), None, Some(9.0), Some(10.0)],
            "Production" => &[Some(10.0), Some(12.0), None, Some(8.0)],
        )
        .unwrap()
    }

    #[test]
    fn missing_rates_are_sorted_worst_first() {
        let rates = missing_rate(&panel()).unwrap();
        let first_column: Vec<Option<&str>> = rates
            .column(COL::SUMMARY_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        // Temp and Production both have 1 of 4 missing; Country and Year none.
        let first_rate = rates.column(COL::MISSING_RATE).unwrap().f64().unwrap();
        assert_eq!(first_rate.get(0), Some(0.25));
        assert_eq!(first_rate.get(3), Some(0.0));
        assert!(first_column[0] == Some("Temp") || first_column[0] == Some("Production"));
    }

    #[test]
    fn year_counts_cover_every_year() {
        let counts = year_counts(&panel(), "Year").unwrap();
        assert_eq!(counts.height(), 2);
        let observations = counts.column(COL::OBSERVATIONS).unwrap().u32().unwrap();
        assert_eq!(observations.get(0), Some(2));
        assert_eq!(observations.get(1), Some(2));
    }

    #[test]
    fn design_matrix_has_no_missing_values_in_modeled_columns() {
        let matrix = design_matrix(&panel(), &["Temp"], "Production").unwrap();
        assert_eq!(matrix.height(), 2);
        assert_eq!(matrix.column("Temp").unwrap().null_count(), 0);
        assert_eq!(matrix.column("Production").unwrap().null_count(), 0);
        assert_eq!(matrix.get_column_names(), vec!["Temp", "Production"]);
    }

    #[test]
    fn design_matrix_requires_modeled_columns_to_exist() {
        let err = design_matrix(&panel(), &["GDD"], "Production").unwrap_err();
        assert!(matches!(err, PanelError::ColumnMissing(column) if column == "GDD"));
    }
}
