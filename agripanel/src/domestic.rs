//! The three-province domestic study: yearbook crop yields for Northeast
//! China merged with annual Growing Degree Days derived from daily
//! temperature downloads.

use log::info;
use nonempty::nonempty;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::align::{align_entities, EntityMap};
use crate::column_names as COL;
use crate::config::Config;
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::reshape::{wide_to_long, year_columns};
use crate::source::{read_csv, read_source, SourceSpec};

/// This module contains the names of the raw source files and artifacts.
pub mod paths {
    pub const HEILONGJIANG_YIELD: &str = "Heilongjiang_yield_clean.csv";
    pub const JILIN_YIELD: &str = "Jilin_yield_clean.csv";
    pub const LIAONING_YIELD: &str = "Liaoning_yield_clean.csv";
    pub const RAW_POWER_DIR: &str = "nasa_power_gdd_raw";
    pub const GDD_SUMMARY: &str = "annual_gdd_summary.csv";
    pub const PANEL: &str = "panel_yield_gdd.csv";
}

/// Yield files and the province each one covers.
pub const PROVINCE_SOURCES: [(&str, &str); 3] = [
    (paths::HEILONGJIANG_YIELD, "Heilongjiang"),
    (paths::JILIN_YIELD, "Jilin"),
    (paths::LIAONING_YIELD, "Liaoning"),
];

/// The crosswalk from representative cities to their provinces.
pub fn city_to_province() -> EntityMap {
    EntityMap::from_pairs([
        ("Harbin", "Heilongjiang"),
        ("Changchun", "Jilin"),
        ("Shenyang", "Liaoning"),
    ])
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Rows lost to unparseable year labels during reshaping.
    pub dropped_period_rows: usize,
    /// Cities in the GDD summary with no province crosswalk entry.
    pub unmapped_cities: BTreeSet<String>,
}

#[derive(Debug)]
pub struct DomesticPanel {
    /// One row per (indicator, province, year), with the province's annual
    /// GDD attached where a matching download exists.
    pub panel: DataFrame,
    pub report: BuildReport,
}

impl DomesticPanel {
    pub fn panel_columns(&self) -> Vec<String> {
        vec![
            COL::INDICATOR.to_string(),
            COL::PROVINCE.to_string(),
            COL::YEAR_LOWER.to_string(),
            COL::VALUE_LOWER.to_string(),
            COL::ANNUAL_GDD.to_string(),
        ]
    }
}

/// Melt one province's yield table. The yearbook transcriptions do not all
/// cover the same years, so each file is melted on its own year columns and
/// the long frames are concatenated afterwards.
fn province_long(
    config: &Config,
    filename: &str,
    province: &str,
    report: &mut BuildReport,
) -> Result<DataFrame> {
    let spec = SourceSpec {
        filename: filename.into(),
        entity_column: COL::INDICATOR.into(),
        ..Default::default()
    };
    let wide = read_source(config, &spec)?;
    let wide = wide
        .lazy()
        .with_column(lit(province).alias(COL::PROVINCE))
        .collect()?;
    let years = year_columns(&wide, &[COL::INDICATOR, COL::PROVINCE]);
    let year_refs: Vec<&str> = years.iter().map(String::as_str).collect();
    let (long, reshape_report) = wide_to_long(
        &wide,
        &[COL::INDICATOR, COL::PROVINCE],
        &year_refs,
        COL::YEAR_LOWER,
        COL::VALUE_LOWER,
    )?;
    report.dropped_period_rows += reshape_report.dropped_rows;
    Ok(long)
}

/// The annual GDD summary, aligned from cities to provinces.
fn gdd_by_province(config: &Config, report: &mut BuildReport) -> Result<DataFrame> {
    let mut gdd = read_csv(&config.output_file(paths::GDD_SUMMARY))?;
    gdd.rename(COL::CITY, COL::PROVINCE)?;
    let (gdd, align_report) = align_entities(&gdd, COL::PROVINCE, &city_to_province())?;
    report.unmapped_cities.extend(align_report.unmapped);
    Ok(gdd
        .lazy()
        .select([
            col(COL::PROVINCE),
            col(COL::YEAR).cast(DataType::Int32).alias(COL::YEAR_LOWER),
            col(COL::ANNUAL_GDD).cast(DataType::Float64),
        ])
        .collect()?)
}

/// Build the yield x GDD panel.
pub fn build(config: &Config) -> Result<DomesticPanel> {
    let mut report = BuildReport::default();

    let mut pieces: Vec<LazyFrame> = Vec::with_capacity(PROVINCE_SOURCES.len());
    for (filename, province) in PROVINCE_SOURCES {
        pieces.push(province_long(config, filename, province, &mut report)?.lazy());
    }
    let yields = concat(pieces, UnionArgs::default())?.collect()?;

    let gdd = gdd_by_province(config, &mut report)?;
    let keys = nonempty![COL::PROVINCE.to_string(), COL::YEAR_LOWER.to_string()];

    // The yield table is unique per (indicator, province, year), not per
    // (province, year); attach the GDD series through the per-key frame.
    let unique_keys = yields
        .select([COL::PROVINCE, COL::YEAR_LOWER])?
        .unique_stable(None, UniqueKeepStrategy::First, None)?;
    let attached = merge(&unique_keys, &gdd, &keys, &MergeOptions::left())?;
    let panel = yields.join(
        &attached,
        [COL::PROVINCE, COL::YEAR_LOWER],
        [COL::PROVINCE, COL::YEAR_LOWER],
        JoinArgs::new(JoinType::Left),
    )?;

    info!("domestic panel built with shape {:?}", panel.shape());
    Ok(DomesticPanel { panel, report })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn fixture_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            paths::HEILONGJIANG_YIELD,
            "指标,2005年,2006年\n\
             粮食单位面积产量(公斤/公顷),4500,4600\n\
             玉米单位面积产量(公斤/公顷),5200,5300\n",
        );
        write_file(
            dir.path(),
            paths::JILIN_YIELD,
            "指标,2005年,2006年\n\
             粮食单位面积产量(公斤/公顷),5000,5100\n",
        );
        write_file(
            dir.path(),
            paths::LIAONING_YIELD,
            "指标,2005年,2006年\n\
             粮食单位面积产量(公斤/公顷),4800,4900\n",
        );
        write_file(
            dir.path(),
            paths::GDD_SUMMARY,
            "City,Year,Annual_GDD\n\
             Harbin,2005,1500.5\n\
             Changchun,2005,1600.25\n\
             Shenyang,2005,1700.75\n",
        );
        let config = Config {
            base_path: dir.path().to_string_lossy().to_string(),
            output_path: dir.path().to_string_lossy().to_string(),
        };
        (dir, config)
    }

    #[test]
    fn panel_attaches_gdd_by_province_and_year() {
        let (_dir, config) = fixture_config();
        let result = build(&config).unwrap();

        // 2 + 1 + 1 indicators x 2 years.
        assert_eq!(result.panel.height(), 8);
        let gdd = result.panel.column(COL::ANNUAL_GDD).unwrap().f64().unwrap();
        let years = result
            .panel
            .column(COL::YEAR_LOWER)
            .unwrap()
            .i32()
            .unwrap();
        for idx in 0..result.panel.height() {
            match years.get(idx) {
                // Downloads cover 2005 only; 2006 rows keep the yield but
                // carry an explicit missing GDD.
                Some(2005) => assert!(gdd.get(idx).is_some()),
                Some(2006) => assert!(gdd.get(idx).is_none()),
                other => panic!("unexpected year {other:?}"),
            }
        }
        assert!(result.report.unmapped_cities.is_empty());
        assert_eq!(result.report.dropped_period_rows, 0);
    }

    #[test]
    fn unknown_city_in_gdd_summary_is_flagged() {
        let (dir, config) = fixture_config();
        write_file(
            dir.path(),
            paths::GDD_SUMMARY,
            "City,Year,Annual_GDD\n\
             Harbin,2005,1500.5\n\
             Dalian,2005,1800.0\n",
        );
        let result = build(&config).unwrap();
        assert_eq!(
            result.report.unmapped_cities.iter().collect::<Vec<_>>(),
            vec!["Dalian"]
        );
    }

    #[test]
    fn panel_columns_match_the_artifact_layout() {
        let (_dir, config) = fixture_config();
        let result = build(&config).unwrap();
        assert_eq!(
            result.panel_columns(),
            vec!["指标", "province", "year", "value", "Annual_GDD"]
        );
        for column in result.panel_columns() {
            assert!(result.panel.column(&column).is_ok(), "missing {column}");
        }
    }
}
