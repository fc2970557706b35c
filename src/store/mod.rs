//! Table Store Abstraction
//!
//! Named-table storage with whole-table replace writes and full-table reads.
//! Stages only ever talk to the store through [`TableStore`].

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryTableStore;
pub use sqlite::SqliteTableStore;

use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;

/// How a write treats an existing table of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop any existing table and write the frame as the whole new table
    Replace,
}

/// Result of the create-if-absent bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StoreStatus {
    AlreadyExists,
    Created,
}

/// Table store trait
pub trait TableStore {
    /// Create the backing store if it is absent. Idempotent.
    fn ensure_exists(&self) -> Result<StoreStatus>;

    /// Whether the backing store itself exists
    fn store_exists(&self) -> bool;

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Read a whole table
    fn read_table(&self, name: &str) -> Result<DataFrame>;

    /// Write a whole table
    fn write_table(&self, name: &str, df: &DataFrame, mode: WriteMode) -> Result<()>;

    /// Column names of a stored table, in stored order
    fn table_columns(&self, name: &str) -> Result<Vec<String>>;
}
