//! Panel-construction pipeline for the two climate-agriculture studies: a
//! four-country cross-national panel and a three-province domestic panel.
//! Raw tabular sources are read, melted from wide year-columns into long
//! form, harmonized onto canonical entity names, merged on (entity, year),
//! enriched with derived variables and written out as CSV artifacts.

use log::debug;

use config::Config;
use error::Result;

// Re-exports
pub use column_names as COL;

// Modules
pub mod acquire;
pub mod align;
pub mod column_names;
pub mod config;
pub mod cross_national;
pub mod derive;
pub mod domestic;
pub mod error;
pub mod merge;
pub mod output;
pub mod reshape;
pub mod source;
pub mod summary;

/// Type for the agripanel pipeline and API
pub struct Agripanel {
    pub config: Config,
}

impl Agripanel {
    /// Setup the Agripanel object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the Agripanel object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Build the cross-national study's item-level and analysis panels.
    pub fn cross_national(&self) -> Result<cross_national::CrossNationalPanels> {
        cross_national::build(&self.config)
    }

    /// Build the domestic study's yield x GDD panel.
    pub fn domestic(&self) -> Result<domestic::DomesticPanel> {
        domestic::build(&self.config)
    }
}

impl Default for Agripanel {
    fn default() -> Self {
        Self::new()
    }
}
