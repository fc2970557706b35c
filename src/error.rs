use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Table store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Table not found in store: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' missing from {table}")]
    MissingColumn { table: String, column: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Database(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

impl PipelineError {
    /// Missing-resource failures are the only hard stops a stage raises.
    pub fn is_missing_resource(&self) -> bool {
        matches!(
            self,
            PipelineError::StoreNotFound(_)
                | PipelineError::SourceNotFound(_)
                | PipelineError::TableNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
