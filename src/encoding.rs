//! Feature encoding for scoring
//!
//! Turns `model_input` into the exact numeric feature list a model was trained
//! on: numeric columns pass through, the collapsed categorical fields become
//! `<field>_<level>` indicator columns.

use crate::error::Result;
use crate::schema::{CATEGORICAL_FIELDS, CITY_TIER, REFERRED_LEAD, TOTAL_LEADS_DROPPED};
use crate::validation::SchemaCheck;
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

const DEFAULT_ENCODED_FEATURES: [&str; 37] = [
    TOTAL_LEADS_DROPPED,
    CITY_TIER,
    REFERRED_LEAD,
    "first_platform_c_Level0",
    "first_platform_c_Level1",
    "first_platform_c_Level2",
    "first_platform_c_Level3",
    "first_platform_c_Level7",
    "first_platform_c_Level8",
    "first_platform_c_others",
    "first_utm_medium_c_Level0",
    "first_utm_medium_c_Level10",
    "first_utm_medium_c_Level11",
    "first_utm_medium_c_Level13",
    "first_utm_medium_c_Level15",
    "first_utm_medium_c_Level16",
    "first_utm_medium_c_Level2",
    "first_utm_medium_c_Level20",
    "first_utm_medium_c_Level26",
    "first_utm_medium_c_Level3",
    "first_utm_medium_c_Level30",
    "first_utm_medium_c_Level33",
    "first_utm_medium_c_Level4",
    "first_utm_medium_c_Level43",
    "first_utm_medium_c_Level5",
    "first_utm_medium_c_Level6",
    "first_utm_medium_c_Level8",
    "first_utm_medium_c_Level9",
    "first_utm_source_c_Level0",
    "first_utm_source_c_Level14",
    "first_utm_source_c_Level16",
    "first_utm_source_c_Level2",
    "first_utm_source_c_Level4",
    "first_utm_source_c_Level5",
    "first_utm_source_c_Level6",
    "first_utm_source_c_Level7",
    "first_utm_source_c_others",
];

/// Which fields get one-hot encoded and which columns the encoded frame carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingSpec {
    pub fields_to_encode: Vec<String>,
    /// Declared output columns, in order
    pub features: Vec<String>,
}

impl Default for EncodingSpec {
    fn default() -> Self {
        Self {
            fields_to_encode: CATEGORICAL_FIELDS.iter().map(|s| s.to_string()).collect(),
            features: DEFAULT_ENCODED_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Where one declared feature's values come from
#[derive(Debug, Clone, PartialEq, Eq)]
enum FeatureSource<'a> {
    Column,
    Indicator { field: &'a str, level: &'a str },
    Missing,
}

impl EncodingSpec {
    fn source_of<'a>(&'a self, feature: &'a str, available: &BTreeSet<&str>) -> FeatureSource<'a> {
        if available.contains(feature) {
            return FeatureSource::Column;
        }
        self.fields_to_encode
            .iter()
            .filter(|field| available.contains(field.as_str()))
            .find_map(|field| {
                feature
                    .strip_prefix(field.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|level| !level.is_empty())
                    .map(|level| FeatureSource::Indicator {
                        field: field.as_str(),
                        level,
                    })
            })
            .unwrap_or(FeatureSource::Missing)
    }
}

/// Encoded frame plus the declared features that could not be derived
#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    pub frame: DataFrame,
    pub zero_filled: Vec<String>,
}

/// Encode `model_input` into exactly `spec.features`, in declared order.
/// Indicators are 1.0 where the field equals the level and 0.0 elsewhere;
/// features with no source are filled with 0.0.
pub fn encode_features(model_input: &DataFrame, spec: &EncodingSpec) -> Result<EncodedFeatures> {
    let available: BTreeSet<&str> = model_input.get_column_names().into_iter().collect();

    let mut exprs = Vec::with_capacity(spec.features.len());
    let mut zero_filled = Vec::new();
    for feature in &spec.features {
        let expr = match spec.source_of(feature, &available) {
            FeatureSource::Column => col(feature).cast(DataType::Float64),
            FeatureSource::Indicator { field, level } => when(col(field).cast(DataType::String).eq(lit(level)))
                .then(lit(1.0))
                .otherwise(lit(0.0)),
            FeatureSource::Missing => {
                zero_filled.push(feature.clone());
                lit(0.0)
            }
        };
        exprs.push(expr.alias(feature));
    }

    if !zero_filled.is_empty() {
        warn!(
            "{} declared feature(s) not derivable from model_input, filled with 0: {}",
            zero_filled.len(),
            zero_filled.iter().join(", ")
        );
    }

    // with_columns broadcasts literals to the frame height, select on its own would not.
    let frame = model_input
        .clone()
        .lazy()
        .with_columns(exprs)
        .select(spec.features.iter().map(|f| col(f)).collect::<Vec<_>>())
        .collect()?;
    info!("Encoded {} rows into {} features", frame.height(), frame.width());

    Ok(EncodedFeatures { frame, zero_filled })
}

/// Compare an encoded frame's columns to the declared feature list.
pub fn check_input_features(encoded: &DataFrame, spec: &EncodingSpec) -> SchemaCheck {
    let actual: BTreeSet<String> = encoded
        .get_column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let check = SchemaCheck::compare(&actual, &spec.features);
    check.log("Encoded features");
    check
}
