//! Transformation stages
//!
//! Each stage is a pure function from an input frame plus lookups to an output
//! frame. Reading and replacing tables is the pipeline's job, not the stages'.

pub mod categorical;
pub mod city_tier;
pub mod interactions;
pub mod load;

pub use categorical::collapse_categoricals;
pub use city_tier::map_city_tier;
pub use interactions::{map_interactions, InteractionOptions, InteractionTables};
pub use load::load;

use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// Fail with `MissingColumn` for the first required column `df` lacks.
pub(crate) fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    let schema = df.schema();
    match columns.iter().find(|c| !schema.contains(c)) {
        Some(missing) => Err(PipelineError::MissingColumn {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn has_column(df: &DataFrame, column: &str) -> bool {
    df.schema().contains(column)
}

/// `column` as Float64 with nulls replaced by 0
pub(crate) fn zero_filled(column: &str) -> Expr {
    col(column)
        .cast(DataType::Float64)
        .fill_null(lit(0.0))
        .alias(column)
}
