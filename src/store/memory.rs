use super::{StoreStatus, TableStore, WriteMode};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

const MEMORY_STORE_PATH: &str = ":memory:";

/// In-memory table store for development/testing
pub struct InMemoryTableStore {
    exists: Mutex<bool>,
    tables: Mutex<HashMap<String, DataFrame>>,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            exists: Mutex::new(true),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// A store that has not been created yet; every table operation fails
    /// with `StoreNotFound` until `ensure_exists` runs.
    pub fn absent() -> Self {
        Self {
            exists: Mutex::new(false),
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn require_store(&self) -> Result<()> {
        if self.store_exists() {
            Ok(())
        } else {
            Err(PipelineError::StoreNotFound(PathBuf::from(MEMORY_STORE_PATH)))
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap();
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl TableStore for InMemoryTableStore {
    fn ensure_exists(&self) -> Result<StoreStatus> {
        let mut exists = self.exists.lock().unwrap();
        if *exists {
            Ok(StoreStatus::AlreadyExists)
        } else {
            *exists = true;
            Ok(StoreStatus::Created)
        }
    }

    fn store_exists(&self) -> bool {
        *self.exists.lock().unwrap()
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        self.require_store()?;
        Ok(self.tables.lock().unwrap().contains_key(name))
    }

    fn read_table(&self, name: &str) -> Result<DataFrame> {
        self.require_store()?;
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::TableNotFound(name.to_string()))
    }

    fn write_table(&self, name: &str, df: &DataFrame, mode: WriteMode) -> Result<()> {
        self.require_store()?;
        match mode {
            WriteMode::Replace => {
                self.tables.lock().unwrap().insert(name.to_string(), df.clone());
            }
        }
        debug!("Replaced in-memory table {} ({} rows)", name, df.height());
        Ok(())
    }

    fn table_columns(&self, name: &str) -> Result<Vec<String>> {
        let df = self.read_table(name)?;
        Ok(df.get_column_names().iter().map(|c| c.to_string()).collect())
    }
}
