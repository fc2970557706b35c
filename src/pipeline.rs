//! Pipeline driver
//!
//! Runs the stages in order against a [`TableStore`]. Each stage reads its
//! predecessor's table, applies its transformation and replaces its own
//! output table. A stage whose input table is absent stops the run.

use crate::config::PipelineConfig;
use crate::encoding::{self, EncodingSpec};
use crate::error::Result;
use crate::ingestion;
use crate::lookups::Lookups;
use crate::schema::{PipelineMode, SchemaRegistry};
use crate::store::{StoreStatus, TableStore, WriteMode};
use crate::transform;
use crate::validation::{self, SchemaCheck};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    CityTier,
    CategoricalCollapse,
    InteractionMapping,
}

impl Stage {
    /// Execution order
    pub const ALL: [Stage; 4] = [
        Stage::Load,
        Stage::CityTier,
        Stage::CategoricalCollapse,
        Stage::InteractionMapping,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::CityTier => "city_tier",
            Stage::CategoricalCollapse => "categorical_collapse",
            Stage::InteractionMapping => "interaction_mapping",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of a table a stage wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
}

impl TableSummary {
    fn of(table: &str, df: &DataFrame) -> Self {
        Self {
            table: table.to_string(),
            rows: df.height(),
            columns: df.width(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub outputs: Vec<TableSummary>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmapped_interactions: Vec<String>,
}

/// Outcome of one end-to-end run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub mode: PipelineMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub store_status: StoreStatus,
    pub raw_schema: SchemaCheck,
    pub stages: Vec<StageReport>,
    pub model_input_schema: SchemaCheck,
}

impl PipelineReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Pipeline<'a> {
    store: &'a dyn TableStore,
    lookups: Lookups,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn TableStore, lookups: Lookups, config: PipelineConfig) -> Self {
        Self {
            store,
            lookups,
            config,
        }
    }

    /// Pipeline with lookups resolved from `config`
    pub fn from_config(store: &'a dyn TableStore, config: PipelineConfig) -> Result<Self> {
        let lookups = config.lookups()?;
        Ok(Self::new(store, lookups, config))
    }

    pub fn mode(&self) -> PipelineMode {
        self.config.mode
    }

    pub fn registry(&self) -> SchemaRegistry {
        self.config.schema_registry(&self.lookups)
    }

    /// Bootstrap the store, check the raw file, run every stage, then check
    /// the resulting `model_input`. Schema mismatches are reported, not fatal.
    pub fn run(&self) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting {} run {}", self.mode(), run_id);

        let store_status = self.store.ensure_exists()?;
        let raw_schema = self.validate_raw()?;

        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            stages.push(self.run_stage(stage)?);
        }

        let model_input_schema = self.validate_model_input()?;
        let finished_at = Utc::now();
        info!(
            "Run {} finished in {} ms",
            run_id,
            (finished_at - started_at).num_milliseconds()
        );

        Ok(PipelineReport {
            run_id,
            mode: self.mode(),
            started_at,
            finished_at,
            store_status,
            raw_schema,
            stages,
            model_input_schema,
        })
    }

    /// Run a single stage against whatever its input table currently holds.
    pub fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        match stage {
            Stage::Load => {
                self.store.ensure_exists()?;
                let raw = ingestion::read_raw_csv(&self.config.raw_data_file())?;
                self.load_frame(raw)
            }
            Stage::CityTier => self.timed(stage, || {
                let tables = &self.config.tables;
                let loaded = self.store.read_table(&tables.loaded_data)?;
                let tiered = transform::map_city_tier(loaded, &self.lookups.city_tiers)?;
                self.replace(&tables.city_tier_mapped, &tiered)?;
                Ok((vec![TableSummary::of(&tables.city_tier_mapped, &tiered)], Vec::new()))
            }),
            Stage::CategoricalCollapse => self.timed(stage, || {
                let tables = &self.config.tables;
                let tiered = self.store.read_table(&tables.city_tier_mapped)?;
                let collapsed =
                    transform::collapse_categoricals(tiered, &self.lookups.significant_levels)?;
                self.replace(&tables.categorical_variables_mapped, &collapsed)?;
                Ok((
                    vec![TableSummary::of(&tables.categorical_variables_mapped, &collapsed)],
                    Vec::new(),
                ))
            }),
            Stage::InteractionMapping => self.timed(stage, || {
                let tables = &self.config.tables;
                let collapsed = self.store.read_table(&tables.categorical_variables_mapped)?;
                let options = self.config.interaction_options(&self.lookups);
                let out = transform::map_interactions(
                    collapsed,
                    &self.lookups.interactions,
                    self.mode(),
                    &options,
                )?;
                self.replace(&tables.interactions_mapped, &out.interactions_mapped)?;
                self.replace(&tables.model_input, &out.model_input)?;
                Ok((
                    vec![
                        TableSummary::of(&tables.interactions_mapped, &out.interactions_mapped),
                        TableSummary::of(&tables.model_input, &out.model_input),
                    ],
                    out.unmapped_types,
                ))
            }),
        }
    }

    /// Load stage over an already-read raw frame.
    pub fn load_frame(&self, raw: DataFrame) -> Result<StageReport> {
        self.timed(Stage::Load, || {
            let table = &self.config.tables.loaded_data;
            let loaded = transform::load(raw)?;
            self.replace(table, &loaded)?;
            Ok((vec![TableSummary::of(table, &loaded)], Vec::new()))
        })
    }

    /// Check the raw file's header against the registry.
    pub fn validate_raw(&self) -> Result<SchemaCheck> {
        validation::check_raw_file(&self.config.raw_data_file(), &self.registry().raw_data)
    }

    /// Check the stored `model_input` table against the registry.
    pub fn validate_model_input(&self) -> Result<SchemaCheck> {
        validation::check_model_input_table(
            self.store,
            &self.config.tables.model_input,
            &self.registry().model_input,
        )
    }

    /// Encode `model_input` into the declared feature list and store it.
    pub fn encode(&self) -> Result<(StageReport, SchemaCheck)> {
        let spec: &EncodingSpec = &self.config.encoding;
        let tables = &self.config.tables;
        let start = Instant::now();

        let model_input = self.store.read_table(&tables.model_input)?;
        let encoded = encoding::encode_features(&model_input, spec)?;
        let check = encoding::check_input_features(&encoded.frame, spec);
        self.replace(&tables.features, &encoded.frame)?;

        let report = StageReport {
            stage: "encode".to_string(),
            outputs: vec![TableSummary::of(&tables.features, &encoded.frame)],
            elapsed_ms: start.elapsed().as_millis() as u64,
            unmapped_interactions: Vec::new(),
        };
        Ok((report, check))
    }

    fn replace(&self, table: &str, df: &DataFrame) -> Result<()> {
        self.store.write_table(table, df, WriteMode::Replace)
    }

    fn timed<F>(&self, stage: Stage, body: F) -> Result<StageReport>
    where
        F: FnOnce() -> Result<(Vec<TableSummary>, Vec<String>)>,
    {
        let start = Instant::now();
        let (outputs, unmapped_interactions) = body()?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        for output in &outputs {
            info!(
                "Stage {}: wrote {} ({} rows, {} columns) in {} ms",
                stage, output.table, output.rows, output.columns, elapsed_ms
            );
        }
        Ok(StageReport {
            stage: stage.name().to_string(),
            outputs,
            elapsed_ms,
            unmapped_interactions,
        })
    }
}
