//! SQLite-backed table store
//!
//! Every operation opens its own connection and closes it on return, so no
//! connection is ever held across pipeline stages.

use super::{StoreStatus, TableStore, WriteMode};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// SQLite table store rooted at a single database file
pub struct SqliteTableStore {
    db_path: PathBuf,
}

impl SqliteTableStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        if !self.store_exists() {
            return Err(PipelineError::StoreNotFound(self.db_path.clone()));
        }
        Ok(Connection::open(&self.db_path)?)
    }

    fn declared_columns(conn: &Connection, name: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(PipelineError::TableNotFound(name.to_string()));
        }
        Ok(columns)
    }
}

impl TableStore for SqliteTableStore {
    fn ensure_exists(&self) -> Result<StoreStatus> {
        if self.store_exists() {
            info!("Table store already exists at {}", self.db_path.display());
            return Ok(StoreStatus::AlreadyExists);
        }

        info!("Creating table store at {}", self.db_path.display());
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.db_path)?;
        // Touch the schema so SQLite writes the file header.
        conn.execute_batch("PRAGMA user_version = 1;")?;
        drop(conn);
        Ok(StoreStatus::Created)
    }

    fn store_exists(&self) -> bool {
        self.db_path.is_file()
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn read_table(&self, name: &str) -> Result<DataFrame> {
        let conn = self.connect()?;
        let declared = Self::declared_columns(&conn, name)?;

        let mut buffers: Vec<ColumnBuffer> = declared
            .iter()
            .map(|(_, decl)| ColumnBuffer::for_declared_type(decl))
            .collect();

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, buffer) in buffers.iter_mut().enumerate() {
                buffer.push(row.get_ref(idx)?);
            }
        }

        let columns: Vec<Series> = declared
            .iter()
            .zip(buffers)
            .map(|((column, _), buffer)| buffer.into_series(column))
            .collect();
        let df = DataFrame::new(columns)?;
        debug!("Read table {} ({} rows)", name, df.height());
        Ok(df)
    }

    fn write_table(&self, name: &str, df: &DataFrame, mode: WriteMode) -> Result<()> {
        let mut conn = self.connect()?;

        let columns: Vec<SqlColumn> = df
            .get_columns()
            .iter()
            .map(SqlColumn::from_series)
            .collect::<Result<_>>()?;

        let definitions: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let tx = conn.transaction()?;
        match mode {
            WriteMode::Replace => {
                tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
            }
        }
        tx.execute(
            &format!("CREATE TABLE {} ({})", quote_ident(name), definitions.join(", ")),
            [],
        )?;
        if !columns.is_empty() {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_ident(name),
                placeholders.join(", ")
            ))?;
            for row in 0..df.height() {
                insert.execute(params_from_iter(columns.iter().map(|c| &c.values[row])))?;
            }
        }
        tx.commit()?;

        debug!("Replaced table {} ({} rows, {} columns)", name, df.height(), df.width());
        Ok(())
    }

    fn table_columns(&self, name: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        Ok(Self::declared_columns(&conn, name)?
            .into_iter()
            .map(|(column, _)| column)
            .collect())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One DataFrame column converted to SQLite values
struct SqlColumn {
    name: String,
    sql_type: &'static str,
    values: Vec<Value>,
}

impl SqlColumn {
    fn from_series(series: &Series) -> Result<Self> {
        let name = series.name().to_string();
        let dtype = series.dtype();

        // Booleans are stored as 0/1 integers and read back as Int64.
        let (sql_type, values) = if dtype.is_integer() || matches!(dtype, DataType::Boolean) {
            let cast = series.cast(&DataType::Int64)?;
            let values = cast
                .i64()?
                .into_iter()
                .map(|v| v.map(Value::Integer).unwrap_or(Value::Null))
                .collect();
            ("INTEGER", values)
        } else if dtype.is_float() {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.map(Value::Real).unwrap_or(Value::Null))
                .collect();
            ("REAL", values)
        } else {
            let cast = series.cast(&DataType::String)?;
            let values = cast
                .str()?
                .into_iter()
                .map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null))
                .collect();
            ("TEXT", values)
        };

        Ok(Self {
            name,
            sql_type,
            values,
        })
    }
}

/// Typed accumulator for one column read back from SQLite
enum ColumnBuffer {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnBuffer {
    fn for_declared_type(decl: &str) -> Self {
        let decl = decl.to_uppercase();
        if decl.contains("INT") {
            ColumnBuffer::Int(Vec::new())
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            ColumnBuffer::Float(Vec::new())
        } else {
            ColumnBuffer::Text(Vec::new())
        }
    }

    fn push(&mut self, value: ValueRef<'_>) {
        match self {
            ColumnBuffer::Int(values) => values.push(match value {
                ValueRef::Integer(v) => Some(v),
                ValueRef::Real(f) => Some(f as i64),
                ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.parse().ok()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            }),
            ColumnBuffer::Float(values) => values.push(match value {
                ValueRef::Real(f) => Some(f),
                ValueRef::Integer(v) => Some(v as f64),
                ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.parse().ok()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            }),
            ColumnBuffer::Text(values) => values.push(match value {
                ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Integer(v) => Some(v.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            }),
        }
    }

    fn into_series(self, name: &str) -> Series {
        match self {
            ColumnBuffer::Int(values) => Series::new(name, values),
            ColumnBuffer::Float(values) => Series::new(name, values),
            ColumnBuffer::Text(values) => Series::new(name, values),
        }
    }
}
