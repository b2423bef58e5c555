use std::path::Path;

use clap::{command, Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use log::info;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use agripanel::{
    acquire::{dongbei_sites, gdd_summary, PowerClient, BASE_TEMP_C},
    config::Config,
    cross_national, domestic,
    output::{write_panel, CsvFormatter},
    source::read_csv,
    summary::{missing_rate, year_counts},
    Agripanel, COL,
};

use crate::display::{display_missing_rate, display_year_counts};
use crate::error::AgripanelCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";

/// The two study pipelines that can be built.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum Study {
    #[strum(serialize = "cross-national", serialize = "crossnational")]
    CrossNational,
    Domestic,
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> AgripanelCliResult<()>;
}

/// The `build` command runs a study pipeline and writes its panel artifacts
/// into the configured output directory.
#[derive(Args, Debug)]
pub struct BuildCommand {
    #[arg(
        short = 's',
        long,
        value_name = "cross-national|domestic",
        help = "Study pipeline to build"
    )]
    study: Study,
    #[arg(long, help = "Also write a JSON build report to this file")]
    report: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for BuildCommand {
    async fn run(&self, config: Config) -> AgripanelCliResult<()> {
        info!("Running `build` subcommand");
        let sp = (!self.quiet).then(|| {
            Spinner::with_timer(
                DEFAULT_PROGRESS_SPINNER,
                "Building panel".to_string() + RUNNING_TAIL_STRING,
            )
        });
        std::fs::create_dir_all(&config.output_path)?;
        let agripanel = Agripanel::new_with_config(config);
        let (report_json, messages) = match self.study {
            Study::CrossNational => {
                let mut panels = agripanel.cross_national()?;
                let item_columns = panels.item_panel_columns();
                write_panel(
                    &agripanel
                        .config
                        .output_file(cross_national::paths::ITEM_PANEL),
                    &mut panels.item_panel,
                    &CsvFormatter {
                        columns: Some(item_columns),
                    },
                )?;
                let analysis_columns = panels.analysis_panel_columns();
                write_panel(
                    &agripanel
                        .config
                        .output_file(cross_national::paths::ANALYSIS_PANEL),
                    &mut panels.analysis_panel,
                    &CsvFormatter {
                        columns: Some(analysis_columns),
                    },
                )?;
                let mut messages = vec![format!(
                    "Built {} ({} rows) and {} ({} rows).",
                    cross_national::paths::ITEM_PANEL,
                    panels.item_panel.height(),
                    cross_national::paths::ANALYSIS_PANEL,
                    panels.analysis_panel.height(),
                )];
                messages.extend(count_messages(
                    panels.report.dropped_period_rows,
                    panels.report.unmapped_entities.len(),
                ));
                (serde_json::to_string_pretty(&panels.report)?, messages)
            }
            Study::Domestic => {
                let mut result = agripanel.domestic()?;
                let columns = result.panel_columns();
                write_panel(
                    &agripanel.config.output_file(domestic::paths::PANEL),
                    &mut result.panel,
                    &CsvFormatter {
                        columns: Some(columns),
                    },
                )?;
                let mut messages = vec![format!(
                    "Built {} ({} rows).",
                    domestic::paths::PANEL,
                    result.panel.height(),
                )];
                messages.extend(count_messages(
                    result.report.dropped_period_rows,
                    result.report.unmapped_cities.len(),
                ));
                (serde_json::to_string_pretty(&result.report)?, messages)
            }
        };
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }
        for message in messages {
            println!("{message}");
        }
        if let Some(report_path) = self.report.as_ref() {
            std::fs::write(report_path, report_json)?;
        }
        Ok(())
    }
}

fn count_messages(dropped_period_rows: usize, unmapped: usize) -> Vec<String> {
    let mut messages = Vec::new();
    if dropped_period_rows > 0 {
        messages.push(format!(
            "{dropped_period_rows} row(s) dropped for unparseable year labels."
        ));
    }
    if unmapped > 0 {
        messages.push(format!(
            "{unmapped} entity identifier(s) had no crosswalk entry; see the build report."
        ));
    }
    messages
}

/// The `acquire` command downloads daily temperatures for the domestic
/// study's observation sites and reduces them to the annual GDD summary.
#[derive(Args, Debug)]
pub struct AcquireCommand {
    #[arg(long, default_value_t = 2005, help = "First year to download")]
    start_year: i32,
    #[arg(long, default_value_t = 2023, help = "Last year to download")]
    end_year: i32,
    #[arg(
        long,
        help = "Keep the raw daily CSV downloads under the base directory"
    )]
    keep_raw: bool,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for AcquireCommand {
    async fn run(&self, config: Config) -> AgripanelCliResult<()> {
        info!("Running `acquire` subcommand");
        let sp = (!self.quiet).then(|| {
            Spinner::with_timer(
                DEFAULT_PROGRESS_SPINNER,
                "Downloading daily temperatures".to_string() + RUNNING_TAIL_STRING,
            )
        });
        let client = PowerClient::new();
        let (records, report) = client
            .fetch_years(&dongbei_sites(), self.start_year, self.end_year)
            .await;
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }

        if self.keep_raw {
            let raw_dir = config.source_path(domestic::paths::RAW_POWER_DIR);
            std::fs::create_dir_all(&raw_dir)?;
            for record in &records {
                let path = raw_dir.join(format!("{}_{}.csv", record.site, record.year));
                write_panel(&path, &mut record.frame.clone(), &CsvFormatter::default())?;
            }
        }

        std::fs::create_dir_all(&config.output_path)?;
        let mut summary = gdd_summary(&records, BASE_TEMP_C)?;
        write_panel(
            &config.output_file(domestic::paths::GDD_SUMMARY),
            &mut summary,
            &CsvFormatter::default(),
        )?;
        println!(
            "Downloaded {} site-year(s); wrote {}.",
            records.len(),
            domestic::paths::GDD_SUMMARY,
        );
        for failure in &report.failures {
            println!(
                "Failed: {} {} ({})",
                failure.site, failure.year, failure.reason
            );
        }
        Ok(())
    }
}

/// The `summary` command describes a panel artifact: per-column missing
/// rates and observation counts per year.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[arg(index = 1, help = "Panel artifact to describe")]
    panel_file: String,
    #[arg(
        long,
        value_name = "COLUMN NAME",
        help = "Year column for the coverage table"
    )]
    year_column: Option<String>,
}

impl RunCommand for SummaryCommand {
    async fn run(&self, _config: Config) -> AgripanelCliResult<()> {
        info!("Running `summary` subcommand");
        let df = read_csv(Path::new(&self.panel_file))?;
        display_missing_rate(&missing_rate(&df)?)?;

        let year_column = self.year_column.clone().or_else(|| {
            [COL::YEAR, COL::YEAR_LOWER]
                .iter()
                .find(|candidate| df.get_column_names().iter().any(|c| c == *candidate))
                .map(|candidate| candidate.to_string())
        });
        match year_column {
            Some(year_column) => {
                let counts = year_counts(&df, &year_column)?;
                display_year_counts(&counts, &year_column)?;
            }
            None => println!("No year column found; skipping the coverage table."),
        }
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Agripanel builds analysis-ready climate-agriculture panel datasets", long_about = None, name="agripanel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Build a study's panel artifacts
    Build(BuildCommand),
    /// Download daily temperatures and derive the annual GDD summary
    Acquire(AcquireCommand),
    /// Describe a panel artifact: missing rates and yearly coverage
    Summary(SummaryCommand),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn study_should_deserialize_properly() {
        assert_eq!(Study::from_str("cross-national").unwrap(), Study::CrossNational);
        assert_eq!(Study::from_str("Domestic").unwrap(), Study::Domestic);
        assert!(Study::from_str("continental").is_err());
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn summary_command_describes_a_panel_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        std::fs::write(&path, "Country,Year,Value\nJapan,2000,10\nJapan,2001,\n").unwrap();
        let command = SummaryCommand {
            panel_file: path.to_string_lossy().to_string(),
            year_column: None,
        };
        assert!(command.run(Config::default()).await.is_ok());
    }
}
