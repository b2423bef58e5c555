//! The four-country cross-national study: FAO agricultural production, OWID
//! climate observations and transcribed macro controls, merged into an
//! item-level panel and an aggregated analysis panel.

use log::info;
use nonempty::nonempty;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::align::{align_entities, EntityMap};
use crate::column_names as COL;
use crate::config::Config;
use crate::derive::{
    apply_rules, Derive, DeriveOptions, DeriveRule, GroupMean, GroupSum, LogTransform,
};
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::output::ordered_with_prefix;
use crate::reshape::{wide_to_long, year_columns};
use crate::source::{read_source, SourceSpec};

/// This module contains the names of the raw source files and artifacts.
pub mod paths {
    pub const FAO_PRODUCTION: &str = "Production_Crops_Livestock_E_All_Data_NOFLAG.csv";
    pub const OWID_TEMPERATURE: &str = "monthly-average-surface-temperatures-by-year.csv";
    pub const OWID_PRECIPITATION: &str = "average-precipitation-per-year.csv";
    pub const MACRO_CONTROLS: &str = "four_country_control_variables.csv";
    pub const ITEM_PANEL: &str = "merged_agri_climate_control.csv";
    pub const ANALYSIS_PANEL: &str = "analysis_panel.csv";
}

pub const TARGET_COUNTRIES: [&str; 4] = ["Japan", "Germany", "Spain", "Italy"];
pub const TARGET_ISO3: [&str; 4] = ["JPN", "DEU", "ESP", "ITA"];

/// Controls earlier than this are too sparse to be usable.
const FIRST_CONTROL_YEAR: i32 = 1960;

/// The crosswalk from ISO3 codes to the canonical country names.
pub fn iso3_to_name() -> EntityMap {
    EntityMap::from_pairs([
        ("JPN", "Japan"),
        ("DEU", "Germany"),
        ("ESP", "Spain"),
        ("ITA", "Italy"),
    ])
}

/// What the build had to discard or flag along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Rows lost to unparseable year labels during reshaping.
    pub dropped_period_rows: usize,
    /// Entity identifiers with no crosswalk entry.
    pub unmapped_entities: BTreeSet<String>,
    /// Rows removed by derivation guards, per rule.
    pub guard_dropped: Vec<(String, usize)>,
}

/// The two artifacts of the cross-national study.
#[derive(Debug)]
pub struct CrossNationalPanels {
    /// One row per (country, item, year): production with climate and
    /// controls attached, climate/control gaps left explicitly missing.
    pub item_panel: DataFrame,
    /// One row per (country, year): aggregated production, average climate
    /// and log-transformed regressors, ready for the regression engine.
    pub analysis_panel: DataFrame,
    pub report: BuildReport,
}

impl CrossNationalPanels {
    pub fn item_panel_columns(&self) -> Vec<String> {
        ordered_with_prefix(
            &self.item_panel,
            &[
                COL::COUNTRY,
                COL::YEAR,
                COL::ITEM,
                COL::ELEMENT,
                COL::UNIT,
                COL::VALUE,
                COL::TEMPERATURE,
                COL::PRECIPITATION,
            ],
        )
    }

    pub fn analysis_panel_columns(&self) -> Vec<String> {
        ordered_with_prefix(
            &self.analysis_panel,
            &[
                COL::COUNTRY,
                COL::YEAR,
                COL::TOTAL_PRODUCTION,
                COL::AVG_TEMPERATURE,
                COL::AVG_PRECIPITATION,
            ],
        )
    }
}

/// FAO production, melted to one row per (country, item, year).
fn production_long(config: &Config, report: &mut BuildReport) -> Result<DataFrame> {
    let spec = SourceSpec {
        filename: paths::FAO_PRODUCTION.into(),
        entity_column: COL::AREA.into(),
        entities: TARGET_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        category: Some((COL::ELEMENT.into(), COL::ELEMENT_PRODUCTION.into())),
        exclude_columns_containing: Some("Code".into()),
    };
    let wide = read_source(config, &spec)?;
    let ids = [COL::AREA, COL::ITEM, COL::ELEMENT, COL::UNIT];
    let years = year_columns(&wide, &ids);
    let year_refs: Vec<&str> = years.iter().map(String::as_str).collect();
    let (mut long, reshape_report) = wide_to_long(&wide, &ids, &year_refs, COL::YEAR, COL::VALUE)?;
    report.dropped_period_rows += reshape_report.dropped_rows;
    long.rename(COL::AREA, COL::COUNTRY)?;
    Ok(long)
}

/// OWID temperature and precipitation, merged to one row per (country, year).
///
/// The temperature source carries one row per (entity, month) and one column
/// per year; melting and averaging by (entity, year) reduces it to an annual
/// series before the merge, which keeps the (entity, year) key unique.
fn climate(config: &Config, report: &mut BuildReport) -> Result<DataFrame> {
    let temperature_spec = SourceSpec {
        filename: paths::OWID_TEMPERATURE.into(),
        entity_column: COL::ENTITY.into(),
        entities: TARGET_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    };
    let temperature_wide = read_source(config, &temperature_spec)?;
    let years = year_columns(&temperature_wide, &[COL::ENTITY, COL::CODE, COL::YEAR]);
    let year_refs: Vec<&str> = years.iter().map(String::as_str).collect();
    let (monthly, reshape_report) = wide_to_long(
        &temperature_wide,
        &[COL::ENTITY],
        &year_refs,
        COL::YEAR,
        COL::TEMPERATURE,
    )?;
    report.dropped_period_rows += reshape_report.dropped_rows;
    let annual = GroupMean {
        keys: vec![COL::ENTITY.into(), COL::YEAR.into()],
        columns: vec![(COL::TEMPERATURE.into(), COL::TEMPERATURE.into())],
    }
    .apply(monthly)?
    .frame;

    let precipitation_spec = SourceSpec {
        filename: paths::OWID_PRECIPITATION.into(),
        entity_column: COL::ENTITY.into(),
        entities: TARGET_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    };
    let mut precipitation = read_source(config, &precipitation_spec)?;
    precipitation.rename(COL::ANNUAL_PRECIPITATION, COL::PRECIPITATION)?;
    let precipitation = precipitation
        .lazy()
        .select([
            col(COL::ENTITY),
            col(COL::YEAR).cast(DataType::Int32),
            col(COL::PRECIPITATION).cast(DataType::Float64),
        ])
        .collect()?;

    let keys = nonempty![COL::ENTITY.to_string(), COL::YEAR.to_string()];
    let mut merged = merge(&annual, &precipitation, &keys, &MergeOptions::inner())?;
    merged.rename(COL::ENTITY, COL::COUNTRY)?;
    Ok(merged.sort([COL::COUNTRY, COL::YEAR], SortMultipleOptions::default())?)
}

/// Macro control variables, keyed by ISO3 and aligned to country names.
fn controls(config: &Config, report: &mut BuildReport) -> Result<DataFrame> {
    let spec = SourceSpec {
        filename: paths::MACRO_CONTROLS.into(),
        entity_column: COL::COUNTRY_CODE.into(),
        entities: TARGET_ISO3.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    };
    let raw = read_source(config, &spec)?;
    let raw = raw
        .lazy()
        .with_column(col(COL::COUNTRY_CODE).alias(COL::COUNTRY))
        .with_column(col(COL::YEAR).cast(DataType::Int32))
        .filter(col(COL::YEAR).gt_eq(lit(FIRST_CONTROL_YEAR)))
        .collect()?;

    let (aligned, align_report) = align_entities(&raw, COL::COUNTRY, &iso3_to_name())?;
    report.unmapped_entities.extend(align_report.unmapped);

    // The source files drifted between a "countryname" and a "Country Code"
    // column over time; the crosswalk above is the single source of truth,
    // so both legacy columns are dropped here.
    let mut aligned = aligned.drop(COL::COUNTRY_CODE)?;
    if aligned
        .get_column_names()
        .iter()
        .any(|c| *c == "countryname")
    {
        aligned = aligned.drop("countryname")?;
    }
    Ok(aligned)
}

/// Build both panels of the cross-national study.
pub fn build(config: &Config) -> Result<CrossNationalPanels> {
    let mut report = BuildReport::default();
    let keys = nonempty![COL::COUNTRY.to_string(), COL::YEAR.to_string()];

    let production = production_long(config, &mut report)?;
    let climate = climate(config, &mut report)?;
    let controls = controls(config, &mut report)?;

    let climate_controls = merge(&climate, &controls, &keys, &MergeOptions::inner())?;

    // Item-level panel: keep every production observation, attach climate and
    // controls where they exist and leave the gaps explicitly missing.
    let item_panel = merge_item_level(&production, &climate_controls)?.sort(
        [COL::COUNTRY, COL::YEAR, COL::ITEM],
        SortMultipleOptions::default(),
    )?;

    // Analysis panel: aggregate, merge and log-transform.
    let total_production = GroupSum {
        keys: vec![COL::COUNTRY.into(), COL::YEAR.into()],
        input: COL::VALUE.into(),
        output: COL::TOTAL_PRODUCTION.into(),
    }
    .apply(production)?
    .frame;
    let climate_avg = GroupMean {
        keys: vec![COL::COUNTRY.into(), COL::YEAR.into()],
        columns: vec![
            (COL::TEMPERATURE.into(), COL::AVG_TEMPERATURE.into()),
            (COL::PRECIPITATION.into(), COL::AVG_PRECIPITATION.into()),
        ],
    }
    .apply(climate)?
    .frame;

    let merged = merge(&total_production, &climate_avg, &keys, &MergeOptions::inner())?;
    let merged = merge(&merged, &controls, &keys, &MergeOptions::inner())?;

    let log_rules = vec![
        DeriveRule::Log(LogTransform::new(
            COL::TOTAL_PRODUCTION,
            COL::LOG_TOTAL_PRODUCTION,
        )),
        DeriveRule::Log(LogTransform::new(COL::REAL_GDP_PC, COL::LOG_GDP_PC)),
        DeriveRule::Log(LogTransform::new(COL::NOMINAL_GDP, COL::LOG_NOMINAL_GDP)),
        DeriveRule::Log(LogTransform::new(COL::POPULATION, COL::LOG_POPULATION)),
        DeriveRule::Log(LogTransform::new(
            COL::GOV_EXPENDITURE,
            COL::LOG_GOV_EXPENDITURE,
        )),
        DeriveRule::Log(LogTransform::new(COL::GOV_REVENUE, COL::LOG_GOV_REVENUE)),
    ];
    let (analysis, derive_report) = apply_rules(merged, &log_rules, &DeriveOptions::default())?;
    report.guard_dropped = derive_report.dropped;
    let analysis_panel = analysis.sort([COL::COUNTRY, COL::YEAR], SortMultipleOptions::default())?;

    info!(
        "cross-national panels built: item {:?}, analysis {:?}",
        item_panel.shape(),
        analysis_panel.shape()
    );
    Ok(CrossNationalPanels {
        item_panel,
        analysis_panel,
        report,
    })
}

/// Left-join the per-item production rows onto the (country, year) climate
/// and control columns. The left side is not unique per (country, year) — it
/// is unique per (country, year, item) — so the uniqueness check runs on the
/// right side only and the join fans the right columns out over the items.
fn merge_item_level(production: &DataFrame, climate_controls: &DataFrame) -> Result<DataFrame> {
    let keys = nonempty![COL::COUNTRY.to_string(), COL::YEAR.to_string()];
    // Reuse the merger's guarantees by joining the deduplicated keys first.
    let unique_keys = production
        .select([COL::COUNTRY, COL::YEAR])?
        .unique_stable(None, UniqueKeepStrategy::First, None)?;
    let attached = merge(&unique_keys, climate_controls, &keys, &MergeOptions::left())?;
    Ok(production.join(
        &attached,
        [COL::COUNTRY, COL::YEAR],
        [COL::COUNTRY, COL::YEAR],
        JoinArgs::new(JoinType::Left),
    )?)
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
            paths::FAO_PRODUCTION,
            "Area,Area Code,Item,Element,Unit,Y2000,Y2001\n\
             Japan,110,Rice,Production,t,100,110\n\
             Japan,110,Wheat,Production,t,50,55\n\
             Japan,110,Rice,Yield,kg/ha,9,9\n\
             Germany,79,Wheat,Production,t,200,210\n\
             France,68,Wheat,Production,t,300,310\n",
        );
        // One row per (entity, month); one column per year.
        write_file(
            dir.path(),
            paths::OWID_TEMPERATURE,
            "Entity,Code,Year,2000,2001\n\
             Japan,JPN,1,10.0,11.0\n\
             Japan,JPN,7,20.0,21.0\n\
             Germany,DEU,1,5.0,6.0\n\
             Germany,DEU,7,15.0,16.0\n",
        );
        write_file(
            dir.path(),
            paths::OWID_PRECIPITATION,
            "Entity,Code,Year,Annual precipitation\n\
             Japan,JPN,2000,1500\n\
             Japan,JPN,2001,1550\n\
             Germany,DEU,2000,700\n\
             Germany,DEU,2001,710\n",
        );
        write_file(
            dir.path(),
            paths::MACRO_CONTROLS,
            "Country Code,Year,Real GDP per capita,Nominal GDP,Population,Inflation (%),Unemployment (%),Government expenditure (%GDP),Government revenue (%GDP)\n\
             JPN,2000,39000,4800,126,0.5,4.7,38,30\n\
             JPN,2001,39200,4700,127,0.4,5.0,38,30\n\
             DEU,2000,33000,1900,82,1.4,7.9,45,44\n\
             DEU,2001,33400,1950,82,1.9,7.8,46,44\n",
        );
        let config = Config {
            base_path: dir.path().to_string_lossy().to_string(),
            output_path: dir.path().to_string_lossy().to_string(),
        };
        (dir, config)
    }

    #[test]
    fn analysis_panel_aggregates_merges_and_log_transforms() {
        let (_dir, config) = fixture_config();
        let panels = build(&config).unwrap();

        // Two countries, two years with full climate and control coverage.
        assert_eq!(panels.analysis_panel.height(), 4);
        let sorted = &panels.analysis_panel;
        let countries: Vec<Option<&str>> = sorted
            .column(COL::COUNTRY)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            countries,
            vec![
                Some("Germany"),
                Some("Germany"),
                Some("Japan"),
                Some("Japan")
            ]
        );

        // Japan 2000: Rice 100 + Wheat 50.
        let total = sorted
            .column(COL::TOTAL_PRODUCTION)
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(total.get(2), Some(150.0));
        // Average of the two monthly observations: (10 + 20) / 2.
        let temp = sorted.column(COL::AVG_TEMPERATURE).unwrap().f64().unwrap();
        assert_eq!(temp.get(2), Some(15.0));
        let log_total = sorted
            .column(COL::LOG_TOTAL_PRODUCTION)
            .unwrap()
            .f64()
            .unwrap();
        assert!((log_total.get(2).unwrap() - 150.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn item_panel_keeps_one_row_per_item_with_climate_attached() {
        let (_dir, config) = fixture_config();
        let panels = build(&config).unwrap();

        // Japan Rice/Wheat x 2 years, Germany Wheat x 2 years; France and
        // the Yield element are filtered at the reader.
        assert_eq!(panels.item_panel.height(), 6);
        assert_eq!(panels.item_panel.column(COL::VALUE).unwrap().null_count(), 0);
        assert!(panels.item_panel.column(COL::TEMPERATURE).is_ok());
        assert!(panels.item_panel.column(COL::REAL_GDP_PC).is_ok());

        let columns = panels.item_panel_columns();
        assert_eq!(columns[0], COL::COUNTRY);
        assert_eq!(columns[1], COL::YEAR);
    }

    #[test]
    fn building_twice_produces_byte_identical_artifacts() {
        use crate::output::{CsvFormatter, OutputGenerator};

        let (_dir, config) = fixture_config();
        let mut first = build(&config).unwrap();
        let mut second = build(&config).unwrap();
        let formatter = CsvFormatter {
            columns: Some(first.analysis_panel_columns()),
        };
        assert_eq!(
            formatter.format(&mut first.analysis_panel).unwrap(),
            formatter.format(&mut second.analysis_panel).unwrap()
        );
    }

    #[test]
    fn report_is_clean_on_full_coverage() {
        let (_dir, config) = fixture_config();
        let panels = build(&config).unwrap();
        assert_eq!(panels.report.dropped_period_rows, 0);
        assert!(panels.report.unmapped_entities.is_empty());
        assert_eq!(
            panels
                .report
                .guard_dropped
                .iter()
                .map(|(_, dropped)| *dropped)
                .sum::<usize>(),
            0
        );
    }
}
