//! Schema Validator
//!
//! Subset-containment checks of an actual column set against a registry entry.
//! Checks never mutate their input and never halt the pipeline: mismatches and
//! unreachable sources come back as a [`SchemaCheck`] for the caller to log.

use crate::error::{PipelineError, Result};
use crate::ingestion;
use crate::schema::SchemaEntry;
use crate::store::TableStore;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of checking one source against a declared schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaCheck {
    Conforms,
    Mismatch { missing: Vec<String> },
    NotFound { resource: String },
}

impl SchemaCheck {
    pub fn is_conforming(&self) -> bool {
        matches!(self, SchemaCheck::Conforms)
    }

    /// Compare `actual` against `expected`; extra actual columns are allowed.
    pub fn compare<'a>(
        actual: &BTreeSet<String>,
        expected: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let missing: Vec<String> = expected
            .into_iter()
            .filter(|column| !actual.contains(*column))
            .cloned()
            .collect();
        if missing.is_empty() {
            SchemaCheck::Conforms
        } else {
            SchemaCheck::Mismatch { missing }
        }
    }

    /// Emit the status line for this outcome
    pub fn log(&self, subject: &str) {
        match self {
            SchemaCheck::Conforms => info!("{} schema is in line with the registry", subject),
            SchemaCheck::Mismatch { missing } => warn!(
                "{} schema is NOT in line with the registry; missing: {}",
                subject,
                missing.iter().join(", ")
            ),
            SchemaCheck::NotFound { resource } => warn!("{} source not found: {}", subject, resource),
        }
    }
}

fn is_subset(actual: &BTreeSet<String>, expected: &BTreeSet<String>) -> bool {
    expected.is_subset(actual)
}

/// True iff every expected raw column is present in `actual`.
pub fn validate_raw_schema(actual: &BTreeSet<String>, expected: &BTreeSet<String>) -> bool {
    is_subset(actual, expected)
}

/// True iff every expected model-input column is present in `actual`.
pub fn validate_model_input_schema(actual: &BTreeSet<String>, expected: &BTreeSet<String>) -> bool {
    is_subset(actual, expected)
}

/// Turn a subset-check verdict into a [`SchemaCheck`], naming what is missing.
fn verdict(passed: bool, actual: &BTreeSet<String>, entry: &SchemaEntry) -> SchemaCheck {
    if passed {
        SchemaCheck::Conforms
    } else {
        SchemaCheck::compare(actual, &entry.columns)
    }
}

/// Check a raw delimited file's header row against the raw registry entry.
pub fn check_raw_file(path: &Path, entry: &SchemaEntry) -> Result<SchemaCheck> {
    let check = match ingestion::read_header(path) {
        Ok(columns) => {
            let passed = validate_raw_schema(&columns, &entry.column_set());
            verdict(passed, &columns, entry)
        }
        Err(PipelineError::SourceNotFound(p)) => SchemaCheck::NotFound {
            resource: p.display().to_string(),
        },
        Err(e) => return Err(e),
    };
    check.log("Raw data");
    Ok(check)
}

/// Check a stored `model_input` table's columns against its registry entry.
pub fn check_model_input_table(
    store: &dyn TableStore,
    table: &str,
    entry: &SchemaEntry,
) -> Result<SchemaCheck> {
    let check = match store.table_columns(table) {
        Ok(columns) => {
            let actual: BTreeSet<String> = columns.into_iter().collect();
            let passed = validate_model_input_schema(&actual, &entry.column_set());
            verdict(passed, &actual, entry)
        }
        Err(e) if e.is_missing_resource() => SchemaCheck::NotFound {
            resource: e.to_string(),
        },
        Err(e) => return Err(e),
    };
    check.log(&entry.name);
    Ok(check)
}
