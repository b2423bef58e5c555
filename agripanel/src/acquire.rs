//! Daily-temperature acquisition and Growing Degree Days.
//!
//! One request per (site, year) against a NASA POWER-style daily point
//! endpoint, with bounded retries and a fixed inter-request delay to respect
//! the API's rate limits. A failed (site, year) pair is recorded in the
//! report and must not abort retrieval for the remaining pairs.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::column_names as COL;
use crate::error::{PanelError, Result};

const POWER_BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";
/// Metadata preamble length of transcribed POWER CSV files without the
/// `-END HEADER-` marker.
pub const POWER_HEADER_ROWS: usize = 10;
const POWER_HEADER_END: &str = "-END HEADER-";
/// POWER encodes missing observations as -999; anything at or below this is
/// outside the GDD domain.
const POWER_MISSING_CUTOFF: f64 = -900.0;
/// Base temperature for temperate crops.
pub const BASE_TEMP_C: f64 = 10.0;

/// A representative observation point for a province.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Site {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
        }
    }
}

/// The capital-city observation points of the three Dongbei provinces.
pub fn dongbei_sites() -> Vec<Site> {
    vec![
        Site::new("Harbin", 45.75, 126.63),
        Site::new("Changchun", 43.88, 125.35),
        Site::new("Shenyang", 41.80, 123.43),
    ]
}

/// Daily observations for one (site, year) pair.
#[derive(Debug, Clone)]
pub struct DailyRecord {
    pub site: String,
    pub year: i32,
    pub frame: DataFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub site: String,
    pub year: i32,
    pub reason: String,
}

/// Failures collected over a retrieval run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquireReport {
    pub failures: Vec<FetchFailure>,
}

/// Client for a POWER-style daily point endpoint.
#[derive(Debug, Clone)]
pub struct PowerClient {
    base_url: String,
    client: reqwest::Client,
    attempts: u32,
    delay: Duration,
}

impl Default for PowerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerClient {
    pub fn new() -> Self {
        Self {
            base_url: POWER_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }

    /// Point the client somewhere else, e.g. a mock server in tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn request_url(&self, site: &Site, year: i32) -> String {
        format!(
            "{}?parameters={},{}&community=AG&longitude={}&latitude={}&start={year}0101&end={year}1231&format=CSV",
            self.base_url,
            COL::T2M_MAX,
            COL::T2M_MIN,
            site.lon,
            site.lat,
        )
    }

    /// Fetch one (site, year) of daily observations, retrying up to the
    /// configured number of attempts.
    pub async fn fetch_daily(&self, site: &Site, year: i32) -> Result<DataFrame> {
        let url = self.request_url(site, year);
        let mut last_error: Option<PanelError> = None;
        for attempt in 1..=self.attempts {
            info!("downloading {} {year} (attempt {attempt})", site.name);
            match self.try_fetch(&url).await {
                Ok(frame) => return Ok(frame),
                Err(err) => {
                    warn!("failed {} {year} (attempt {attempt}): {err}", site.name);
                    last_error = Some(err);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        // Unwrap: the loop above runs at least once, so an error is recorded
        Err(last_error.unwrap())
    }

    async fn try_fetch(&self, url: &str) -> Result<DataFrame> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_power_csv(&body)
    }

    /// Fetch all (site, year) pairs sequentially, sleeping the configured
    /// delay between requests. Failures are collected, never fatal.
    pub async fn fetch_years(
        &self,
        sites: &[Site],
        start_year: i32,
        end_year: i32,
    ) -> (Vec<DailyRecord>, AcquireReport) {
        let mut records = Vec::new();
        let mut report = AcquireReport::default();
        for site in sites {
            for year in start_year..=end_year {
                match self.fetch_daily(site, year).await {
                    Ok(frame) => records.push(DailyRecord {
                        site: site.name.clone(),
                        year,
                        frame,
                    }),
                    Err(err) => {
                        warn!("giving up on {} {year}: {err}", site.name);
                        report.failures.push(FetchFailure {
                            site: site.name.clone(),
                            year,
                            reason: err.to_string(),
                        });
                    }
                }
                tokio::time::sleep(self.delay).await;
            }
        }
        (records, report)
    }
}

/// Parse a POWER CSV body, skipping the metadata preamble.
pub fn parse_power_csv(body: &str) -> Result<DataFrame> {
    let data = match body.find(POWER_HEADER_END) {
        Some(index) => {
            let after = &body[index..];
            match after.find('\n') {
                Some(newline) => &after[newline + 1..],
                None => "",
            }
        }
        None => {
            let mut rest = body;
            for _ in 0..POWER_HEADER_ROWS {
                match rest.find('\n') {
                    Some(newline) => rest = &rest[newline + 1..],
                    None => {
                        rest = "";
                        break;
                    }
                }
            }
            rest
        }
    };
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(data.as_bytes().to_vec()))
        .finish()?;
    for column in [COL::T2M_MAX, COL::T2M_MIN] {
        if !df.get_column_names().iter().any(|c| *c == column) {
            return Err(PanelError::SchemaMismatch {
                table: "POWER daily".to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(df)
}

/// Annual Growing Degree Days from a daily max/min temperature frame:
/// sum over days of `max(0, (tmax + tmin)/2 - base)`. Days with a missing
/// or sentinel temperature are outside the domain and excluded up front.
pub fn annual_gdd(daily: &DataFrame, base_temp: f64) -> Result<f64> {
    let mean_excess = (col(COL::T2M_MAX) + col(COL::T2M_MIN)) / lit(2.0) - lit(base_temp);
    let out = daily
        .clone()
        .lazy()
        .filter(
            col(COL::T2M_MAX)
                .is_not_null()
                .and(col(COL::T2M_MIN).is_not_null())
                .and(col(COL::T2M_MAX).gt(lit(POWER_MISSING_CUTOFF)))
                .and(col(COL::T2M_MIN).gt(lit(POWER_MISSING_CUTOFF))),
        )
        .select([when(mean_excess.clone().gt(lit(0.0)))
            .then(mean_excess)
            .otherwise(lit(0.0))
            .sum()
            .round(2)
            .alias(COL::ANNUAL_GDD)])
        .collect()?;
    Ok(out
        .column(COL::ANNUAL_GDD)?
        .f64()?
        .get(0)
        .unwrap_or_default())
}

/// Reduce daily records to an annual GDD summary with columns
/// `(City, Year, Annual_GDD)`, sorted by city and year.
pub fn gdd_summary(records: &[DailyRecord], base_temp: f64) -> Result<DataFrame> {
    let mut cities: Vec<String> = Vec::with_capacity(records.len());
    let mut years: Vec<i32> = Vec::with_capacity(records.len());
    let mut totals: Vec<f64> = Vec::with_capacity(records.len());
    for record in records {
        cities.push(record.site.clone());
        years.push(record.year);
        totals.push(annual_gdd(&record.frame, base_temp)?);
    }
    let summary = df!(
        COL::CITY => cities,
        COL::YEAR => years,
        COL::ANNUAL_GDD => totals,
    )?;
    Ok(summary.sort(
        [COL::CITY, COL::YEAR],
        SortMultipleOptions::default(),
    )?)
}

/// Load previously downloaded `{City}_{Year}.csv` POWER files from a
/// directory. Files that fail to parse are reported, not fatal.
pub fn load_power_dir(dir: &Path) -> Result<(Vec<DailyRecord>, AcquireReport)> {
    let mut records = Vec::new();
    let mut report = AcquireReport::default();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    entries.sort();

    for path in entries {
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let Some((site, year)) = stem.rsplit_once('_') else {
            warn!("skipping '{stem}.csv': expected a City_Year filename");
            continue;
        };
        let Ok(year) = year.parse::<i32>() else {
            warn!("skipping '{stem}.csv': '{year}' is not a year");
            continue;
        };
        match std::fs::read_to_string(&path).map_err(PanelError::from).and_then(|body| parse_power_csv(&body)) {
            Ok(frame) => records.push(DailyRecord {
                site: site.to_string(),
                year,
                frame,
            }),
            Err(err) => {
                warn!("error processing {}: {err}", path.display());
                report.failures.push(FetchFailure {
                    site: site.to_string(),
                    year,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok((records, report))
}
