//! This module stores the canonical column names used across the pipeline
//! stages, so that every reader, merge and derivation references a single
//! vocabulary. Note that the raw-source names must be synchronised with the
//! headers of the transcribed CSV files!

// Shared panel keys
pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const VALUE: &str = "Value";

// FAO production source
pub const AREA: &str = "Area";
pub const ITEM: &str = "Item";
pub const ELEMENT: &str = "Element";
pub const UNIT: &str = "Unit";
pub const ELEMENT_PRODUCTION: &str = "Production";

// OWID climate sources
pub const ENTITY: &str = "Entity";
pub const CODE: &str = "Code";
pub const TEMPERATURE: &str = "Temperature (°C)";
pub const PRECIPITATION: &str = "Precipitation (mm)";
pub const ANNUAL_PRECIPITATION: &str = "Annual precipitation";

// Macro control variables (headers as transcribed from the macro-data
// package output)
pub const COUNTRY_CODE: &str = "Country Code";
pub const REAL_GDP_PC: &str = "Real GDP per capita";
pub const NOMINAL_GDP: &str = "Nominal GDP";
pub const POPULATION: &str = "Population";
pub const INFLATION: &str = "Inflation (%)";
pub const UNEMPLOYMENT: &str = "Unemployment (%)";
pub const GOV_EXPENDITURE: &str = "Government expenditure (%GDP)";
pub const GOV_REVENUE: &str = "Government revenue (%GDP)";

// Aggregated and derived columns
pub const AVG_TEMPERATURE: &str = "Avg_Temperature";
pub const AVG_PRECIPITATION: &str = "Avg_Precipitation";
pub const TOTAL_PRODUCTION: &str = "Total_Production";
pub const LOG_TOTAL_PRODUCTION: &str = "Log_Total_Production";
pub const LOG_GDP_PC: &str = "Log_GDP_per_capita";
pub const LOG_NOMINAL_GDP: &str = "Log_Nominal_GDP";
pub const LOG_POPULATION: &str = "Log_Population";
pub const LOG_GOV_EXPENDITURE: &str = "Log_Gov_Expenditure";
pub const LOG_GOV_REVENUE: &str = "Log_Gov_Revenue";

// Domestic study. The yield indicator header is the yearbook's own label and
// is treated as an opaque UTF-8 identifier.
pub const INDICATOR: &str = "指标";
pub const PROVINCE: &str = "province";
pub const YEAR_LOWER: &str = "year";
pub const VALUE_LOWER: &str = "value";
pub const CITY: &str = "City";
pub const ANNUAL_GDD: &str = "Annual_GDD";

// NASA POWER daily temperature columns
pub const T2M_MAX: &str = "T2M_MAX";
pub const T2M_MIN: &str = "T2M_MIN";

// Summary tables
pub const SUMMARY_COLUMN: &str = "Column";
pub const MISSING_RATE: &str = "Missing Rate";
pub const OBSERVATIONS: &str = "Observations";
