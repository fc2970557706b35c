pub mod config;
pub mod encoding;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod lookups;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod transform;
pub mod validation;

pub use config::{PipelineConfig, TableNames};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineReport, Stage, StageReport};
pub use schema::{PipelineMode, SchemaRegistry};
pub use store::{InMemoryTableStore, SqliteTableStore, TableStore};
