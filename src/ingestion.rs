//! Raw input reading - delimited lead files into DataFrames

use crate::error::{PipelineError, Result};
use csv::ReaderBuilder;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const INFER_SCHEMA_LENGTH: usize = 10_000;

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::SourceNotFound(path.to_path_buf()))
    }
}

/// Read only the header row of a delimited file.
pub fn read_header(path: &Path) -> Result<BTreeSet<String>> {
    ensure_exists(path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    Ok(headers)
}

/// Read a raw lead file. Dates stay as text; the pipeline never parses them.
/// Column names are trimmed the same way `read_header` trims them.
pub fn read_raw_csv(path: &Path) -> Result<DataFrame> {
    ensure_exists(path)?;
    let mut df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_LENGTH))
        .finish()?
        .collect()?;
    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    debug!("Read {} rows x {} columns from {}", df.height(), df.width(), path.display());
    Ok(df)
}
