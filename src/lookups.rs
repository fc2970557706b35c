//! Static lookup tables
//!
//! City tiers, significant categorical levels and the interaction-name map.
//! All three are loaded once and injected read-only into the stages.

use crate::error::{PipelineError, Result};
use crate::schema::{
    CITY_MAPPED, CITY_TIER, FIRST_PLATFORM, FIRST_UTM_MEDIUM, FIRST_UTM_SOURCE, INTERACTION_MAPPING,
    INTERACTION_TYPE,
};
use csv::ReaderBuilder;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::info;

const BUNDLED_CITY_TIERS: &str = include_str!("../config/city_tier_mapping.json");
const BUNDLED_SIGNIFICANT_LEVELS: &str = include_str!("../config/significant_levels.json");
const BUNDLED_INTERACTION_MAPPING: &str = include_str!("../config/interaction_mapping.csv");

/// City name to tier (1.0 is the best tier)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityTierMapping(BTreeMap<String, f64>);

impl CityTierMapping {
    pub fn new(tiers: impl IntoIterator<Item = (impl Into<String>, f64)>) -> Self {
        Self(tiers.into_iter().map(|(city, tier)| (city.into(), tier)).collect())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, city: &str) -> Option<f64> {
        self.0.get(city).copied()
    }

    pub fn tier_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.values().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Two-column frame (`city_mapped`, `city_tier`) used as the right side of a join
    pub fn to_frame(&self) -> Result<DataFrame> {
        let cities: Vec<&str> = self.0.keys().map(String::as_str).collect();
        let tiers: Vec<f64> = self.0.values().copied().collect();
        Ok(DataFrame::new(vec![
            Series::new(CITY_MAPPED, cities),
            Series::new(CITY_TIER, tiers),
        ])?)
    }
}

/// Categorical values frequent enough to keep distinct, per field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantLevels {
    pub platform: BTreeSet<String>,
    pub medium: BTreeSet<String>,
    pub source: BTreeSet<String>,
}

impl SignificantLevels {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Significance set for one of the collapsed categorical fields
    pub fn for_field(&self, field: &str) -> Option<&BTreeSet<String>> {
        match field {
            FIRST_PLATFORM => Some(&self.platform),
            FIRST_UTM_MEDIUM => Some(&self.medium),
            FIRST_UTM_SOURCE => Some(&self.source),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InteractionMappingRow {
    interaction_type: String,
    interaction_mapping: String,
}

/// Raw interaction column to canonical interaction name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionMap(BTreeMap<String, String>);

impl InteractionMap {
    pub fn new(pairs: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Parse the `interaction_type,interaction_mapping` row set.
    /// A repeated interaction type keeps its last mapping.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);
        let mut map = BTreeMap::new();
        for row in rdr.deserialize() {
            let row: InteractionMappingRow = row?;
            map.insert(row.interaction_type, row.interaction_mapping);
        }
        Ok(Self(map))
    }

    pub fn get(&self, interaction_type: &str) -> Option<&str> {
        self.0.get(interaction_type).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Distinct canonical names, sorted
    pub fn feature_names(&self) -> Vec<String> {
        self.0
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Two-column frame (`interaction_type`, `interaction_mapping`) for the name join
    pub fn to_frame(&self) -> Result<DataFrame> {
        let types: Vec<&str> = self.0.keys().map(String::as_str).collect();
        let names: Vec<&str> = self.0.values().map(String::as_str).collect();
        Ok(DataFrame::new(vec![
            Series::new(INTERACTION_TYPE, types),
            Series::new(INTERACTION_MAPPING, names),
        ])?)
    }
}

/// All static lookups a pipeline run needs
#[derive(Debug, Clone, PartialEq)]
pub struct Lookups {
    pub city_tiers: CityTierMapping,
    pub significant_levels: SignificantLevels,
    pub interactions: InteractionMap,
}

impl Lookups {
    /// Lookups compiled into the binary from `config/`
    pub fn bundled() -> Result<Self> {
        Ok(Self {
            city_tiers: CityTierMapping::from_json_str(BUNDLED_CITY_TIERS)?,
            significant_levels: SignificantLevels::from_json_str(BUNDLED_SIGNIFICANT_LEVELS)?,
            interactions: InteractionMap::from_csv_reader(BUNDLED_INTERACTION_MAPPING.as_bytes())?,
        })
    }

    /// Load each lookup from its file, falling back to the bundled copy for
    /// any path left unset.
    pub fn load(
        city_tiers: Option<&Path>,
        significant_levels: Option<&Path>,
        interactions: Option<&Path>,
    ) -> Result<Self> {
        let bundled = Self::bundled()?;

        let city_tiers = match city_tiers {
            Some(path) => CityTierMapping::from_json_str(&read_lookup(path)?)?,
            None => bundled.city_tiers,
        };
        let significant_levels = match significant_levels {
            Some(path) => SignificantLevels::from_json_str(&read_lookup(path)?)?,
            None => bundled.significant_levels,
        };
        let interactions = match interactions {
            Some(path) => InteractionMap::from_csv_reader(read_lookup(path)?.as_bytes())?,
            None => bundled.interactions,
        };

        info!(
            "Loaded lookups: {} cities, {} interaction types -> {} names",
            city_tiers.len(),
            interactions.len(),
            interactions.feature_names().len()
        );

        Ok(Self {
            city_tiers,
            significant_levels,
            interactions,
        })
    }
}

fn read_lookup(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}
