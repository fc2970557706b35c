//! Pipeline configuration
//!
//! Loaded from an optional JSON file, then overridden from `LEAD_SCORING_*`
//! environment variables (a `.env` file is honoured by the binary).

use crate::encoding::EncodingSpec;
use crate::error::{PipelineError, Result};
use crate::lookups::Lookups;
use crate::schema::{PipelineMode, SchemaRegistry};
use crate::transform::InteractionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Names of the tables each stage writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub loaded_data: String,
    pub city_tier_mapped: String,
    pub categorical_variables_mapped: String,
    pub interactions_mapped: String,
    pub model_input: String,
    pub features: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            loaded_data: "loaded_data".to_string(),
            city_tier_mapped: "city_tier_mapped".to_string(),
            categorical_variables_mapped: "categorical_variables_mapped".to_string(),
            interactions_mapped: "interactions_mapped".to_string(),
            model_input: "model_input".to_string(),
            features: "features".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub db_file_name: String,
    pub data_directory: PathBuf,
    pub data_file_name: String,

    /// Lookup overrides; unset means the bundled copy
    pub city_tier_mapping: Option<PathBuf>,
    pub significant_levels: Option<PathBuf>,
    pub interaction_mapping: Option<PathBuf>,

    pub mode: PipelineMode,
    pub tables: TableNames,

    /// Canonical interaction columns of `model_input`; unset means every name
    /// the interaction map produces
    pub interaction_features: Option<Vec<String>>,
    pub excluded_interactions: Vec<String>,

    pub encoding: EncodingSpec,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("database"),
            db_file_name: "lead_scoring_data_cleaning.db".to_string(),
            data_directory: PathBuf::from("data"),
            data_file_name: "leadscoring.csv".to_string(),
            city_tier_mapping: None,
            significant_levels: None,
            interaction_mapping: None,
            mode: PipelineMode::default(),
            tables: TableNames::default(),
            interaction_features: None,
            excluded_interactions: Vec::new(),
            encoding: EncodingSpec::default(),
        }
    }
}

impl PipelineConfig {
    /// Read `path` if given (defaults otherwise), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply `LEAD_SCORING_*` overrides resolved through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("LEAD_SCORING_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LEAD_SCORING_DB_FILE") {
            self.db_file_name = v;
        }
        if let Some(v) = lookup("LEAD_SCORING_DATA_DIR") {
            self.data_directory = PathBuf::from(v);
        }
        if let Some(v) = lookup("LEAD_SCORING_DATA_FILE") {
            self.data_file_name = v;
        }
        if let Some(v) = lookup("LEAD_SCORING_MODE") {
            self.mode = v.parse().map_err(PipelineError::Config)?;
        }
        Ok(())
    }

    pub fn db_file(&self) -> PathBuf {
        self.db_path.join(&self.db_file_name)
    }

    pub fn raw_data_file(&self) -> PathBuf {
        self.data_directory.join(&self.data_file_name)
    }

    pub fn lookups(&self) -> Result<Lookups> {
        Lookups::load(
            self.city_tier_mapping.as_deref(),
            self.significant_levels.as_deref(),
            self.interaction_mapping.as_deref(),
        )
    }

    pub fn interaction_options(&self, lookups: &Lookups) -> InteractionOptions {
        let mut options = InteractionOptions::from_map(&lookups.interactions);
        if let Some(features) = &self.interaction_features {
            options.features = features.clone();
        }
        options.excluded = self.excluded_interactions.clone();
        options
    }

    pub fn schema_registry(&self, lookups: &Lookups) -> SchemaRegistry {
        SchemaRegistry::for_mode(self.mode, &self.interaction_options(lookups).features)
    }
}
