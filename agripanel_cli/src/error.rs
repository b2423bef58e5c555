use agripanel::error::PanelError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum AgripanelCliError {
    #[error("Anyhow error")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error")]
    PolarsError(#[from] PolarsError),
    #[error("panel error")]
    PanelError(#[from] PanelError),
    #[error("std IO error")]
    IOError(#[from] std::io::Error),
}

pub type AgripanelCliResult<T> = Result<T, AgripanelCliError>;
