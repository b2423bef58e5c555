//! Derived-variable rules applied to a merged panel.
//!
//! Each rule names its inputs, its output column and a domain guard. Rows
//! failing the guard are filtered out before the transform runs, and the
//! count of filtered rows is reported to the caller; in strict mode an
//! excessive drop fraction aborts the run instead. Aggregation rules are
//! reductions: exactly one output row per group, keys preserved.

use enum_dispatch::enum_dispatch;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

/// A rule's output: the transformed frame plus the rows its guard removed.
#[derive(Debug)]
pub struct Derived {
    pub frame: DataFrame,
    pub dropped: usize,
}

#[enum_dispatch]
pub trait Derive {
    /// Rule name used in reports and strict-mode errors.
    fn name(&self) -> String;
    fn apply(&self, df: DataFrame) -> Result<Derived>;
}

#[enum_dispatch(Derive)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeriveRule {
    Log(LogTransform),
    Ratio(RatioTransform),
    GroupSum(GroupSum),
    GroupMean(GroupMean),
}

fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for column in columns {
        if !df.get_column_names().iter().any(|c| c == column) {
            return Err(PanelError::ColumnMissing(column.to_string()));
        }
    }
    Ok(())
}

/// Natural log of a strictly positive input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTransform {
    pub input: String,
    pub output: String,
}

impl LogTransform {
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
        }
    }
}

impl Derive for LogTransform {
    fn name(&self) -> String {
        format!("log({})", self.input)
    }

    fn apply(&self, df: DataFrame) -> Result<Derived> {
        require_columns(&df, &[&self.input])?;
        let before = df.height();
        let guard = col(&self.input)
            .is_not_null()
            .and(col(&self.input).gt(lit(0.0)));
        let frame = df
            .lazy()
            .filter(guard)
            .with_column(
                col(&self.input)
                    .cast(DataType::Float64)
                    .log(std::f64::consts::E)
                    .alias(&self.output),
            )
            .collect()?;
        let dropped = before - frame.height();
        Ok(Derived { frame, dropped })
    }
}

/// Ratio of two columns; rows with a missing or zero denominator are outside
/// the domain and get filtered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioTransform {
    pub numerator: String,
    pub denominator: String,
    pub output: String,
}

impl Derive for RatioTransform {
    fn name(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }

    fn apply(&self, df: DataFrame) -> Result<Derived> {
        require_columns(&df, &[&self.numerator, &self.denominator])?;
        let before = df.height();
        let guard = col(&self.denominator)
            .is_not_null()
            .and(col(&self.denominator).neq(lit(0.0)));
        let frame = df
            .lazy()
            .filter(guard)
            .with_column(
                (col(&self.numerator).cast(DataType::Float64)
                    / col(&self.denominator).cast(DataType::Float64))
                .alias(&self.output),
            )
            .collect()?;
        let dropped = before - frame.height();
        Ok(Derived { frame, dropped })
    }
}

/// Sum of `input` within each key group, replacing the per-category rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSum {
    pub keys: Vec<String>,
    pub input: String,
    pub output: String,
}

impl Derive for GroupSum {
    fn name(&self) -> String {
        format!("sum({}) by ({})", self.input, self.keys.join(", "))
    }

    fn apply(&self, df: DataFrame) -> Result<Derived> {
        let mut required: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        required.push(&self.input);
        require_columns(&df, &required)?;
        let frame = df
            .lazy()
            .group_by_stable(self.keys.iter().map(|k| col(k)).collect::<Vec<_>>())
            .agg([col(&self.input).sum().alias(&self.output)])
            .collect()?
            .sort(self.keys.clone(), SortMultipleOptions::default())?;
        Ok(Derived { frame, dropped: 0 })
    }
}

/// Mean of each `(input, output)` pair within each key group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMean {
    pub keys: Vec<String>,
    pub columns: Vec<(String, String)>,
}

impl Derive for GroupMean {
    fn name(&self) -> String {
        format!(
            "mean({}) by ({})",
            self.columns
                .iter()
                .map(|(input, _)| input.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.keys.join(", ")
        )
    }

    fn apply(&self, df: DataFrame) -> Result<Derived> {
        let mut required: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        required.extend(self.columns.iter().map(|(input, _)| input.as_str()));
        require_columns(&df, &required)?;
        let aggs: Vec<Expr> = self
            .columns
            .iter()
            .map(|(input, output)| col(input).mean().alias(output))
            .collect();
        let frame = df
            .lazy()
            .group_by_stable(self.keys.iter().map(|k| col(k)).collect::<Vec<_>>())
            .agg(aggs)
            .collect()?
            .sort(self.keys.clone(), SortMultipleOptions::default())?;
        Ok(Derived { frame, dropped: 0 })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeriveOptions {
    /// Strict mode: error if a rule's guard drops more than this fraction of
    /// the rows it was given.
    pub strict_max_dropped: Option<f64>,
}

/// Per-rule drop counts, in application order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeriveReport {
    pub dropped: Vec<(String, usize)>,
}

impl DeriveReport {
    pub fn total_dropped(&self) -> usize {
        self.dropped.iter().map(|(_, count)| count).sum()
    }
}

/// Apply `rules` in order, accumulating the drop counts.
pub fn apply_rules(
    df: DataFrame,
    rules: &[DeriveRule],
    options: &DeriveOptions,
) -> Result<(DataFrame, DeriveReport)> {
    let mut frame = df;
    let mut report = DeriveReport::default();
    for rule in rules {
        let total = frame.height();
        let derived = rule.apply(frame)?;
        if let Some(limit) = options.strict_max_dropped {
            if total > 0 && derived.dropped as f64 / total as f64 > limit {
                return Err(PanelError::DomainViolation {
                    rule: rule.name(),
                    dropped: derived.dropped,
                    total,
                    limit,
                });
            }
        }
        if derived.dropped > 0 {
            info!(
                "derivation '{}' dropped {} of {} rows",
                rule.name(),
                derived.dropped,
                total
            );
        }
        report.dropped.push((rule.name(), derived.dropped));
        frame = derived.frame;
    }
    Ok((frame, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_guard_drops_non_positive_values() {
        let df = df!(
            "Entity" => &["a", "b", "c", "d"],
            "Value" => &[100.0, -5.0, 0.0, 50.0],
        )
        .unwrap();
        let rule = LogTransform::new("Value", "Log_Value");
        let derived = rule.apply(df).unwrap();
        assert_eq!(derived.dropped, 2);
        assert_eq!(derived.frame.height(), 2);
        let logs = derived.frame.column("Log_Value").unwrap().f64().unwrap();
        assert!((logs.get(0).unwrap() - 100.0f64.ln()).abs() < 1e-12);
        assert!((logs.get(1).unwrap() - 50.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn log_guard_drops_missing_values_too() {
        let df = df!(
            "Entity" => &["a", "b"],
            "Value" => &[Some(100.0), None],
        )
        .unwrap();
        let derived = LogTransform::new("Value", "Log_Value").apply(df).unwrap();
        assert_eq!(derived.dropped, 1);
        assert_eq!(derived.frame.height(), 1);
    }

    #[test]
    fn strict_mode_trips_on_excessive_drops() {
        let df = df!(
            "Entity" => &["a", "b", "c", "d"],
            "Value" => &[100.0, -5.0, 0.0, 50.0],
        )
        .unwrap();
        let rules = vec![DeriveRule::Log(LogTransform::new("Value", "Log_Value"))];
        let options = DeriveOptions {
            strict_max_dropped: Some(0.25),
        };
        let err = apply_rules(df, &rules, &options).unwrap_err();
        assert!(matches!(
            err,
            PanelError::DomainViolation {
                dropped: 2,
                total: 4,
                ..
            }
        ));
    }

    #[test]
    fn group_sum_reduces_to_one_row_per_group() {
        let df = df!(
            "Country" => &["Japan", "Japan", "Germany"],
            "Year" => &[2000i32, 2000, 2000],
            "Value" => &[10.0, 20.0, 5.0],
        )
        .unwrap();
        let rule = GroupSum {
            keys: vec!["Country".into(), "Year".into()],
            input: "Value".into(),
            output: "Total".into(),
        };
        let derived = rule.apply(df).unwrap();
        let expected = df!(
            "Country" => &["Germany", "Japan"],
            "Year" => &[2000i32, 2000],
            "Total" => &[5.0, 30.0],
        )
        .unwrap();
        assert_eq!(derived.frame, expected);
    }

    #[test]
    fn group_mean_averages_each_requested_column() {
        let df = df!(
            "Country" => &["Japan", "Japan"],
            "Year" => &[2000i32, 2000],
            "Temp" => &[10.0, 20.0],
            "Precip" => &[100.0, 300.0],
        )
        .unwrap();
        let rule = GroupMean {
            keys: vec!["Country".into(), "Year".into()],
            columns: vec![
                ("Temp".into(), "Avg_Temp".into()),
                ("Precip".into(), "Avg_Precip".into()),
            ],
        };
        let derived = rule.apply(df).unwrap();
        assert_eq!(derived.frame.height(), 1);
        let avg_temp = derived.frame.column("Avg_Temp").unwrap().f64().unwrap();
        assert_eq!(avg_temp.get(0), Some(15.0));
        let avg_precip = derived.frame.column("Avg_Precip").unwrap().f64().unwrap();
        assert_eq!(avg_precip.get(0), Some(200.0));
    }

    #[test]
    fn ratio_guard_drops_zero_denominators() {
        let df = df!(
            "Num" => &[10.0, 20.0],
            "Den" => &[2.0, 0.0],
        )
        .unwrap();
        let rule = RatioTransform {
            numerator: "Num".into(),
            denominator: "Den".into(),
            output: "Ratio".into(),
        };
        let derived = rule.apply(df).unwrap();
        assert_eq!(derived.dropped, 1);
        let ratio = derived.frame.column("Ratio").unwrap().f64().unwrap();
        assert_eq!(ratio.get(0), Some(5.0));
    }
}
