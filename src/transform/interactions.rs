//! Interaction mapping stage
//!
//! Unpivots the raw interaction indicator columns into long form, renames each
//! raw interaction to its canonical name, then pivots back to one column per
//! canonical name summed over the index columns.

use super::{has_column, require_columns};
use crate::error::{PipelineError, Result};
use crate::lookups::InteractionMap;
use crate::schema::{
    PipelineMode, APP_COMPLETE_FLAG, INTERACTION_MAPPING, INTERACTION_TYPE, INTERACTION_VALUE,
    NON_INTERACTION_COLUMNS,
};
use itertools::Itertools;
use polars::prelude::*;
use tracing::{debug, warn};

/// Feature set and exclusions for one interaction-mapping run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionOptions {
    /// Canonical names `model_input` carries, in column order
    pub features: Vec<String>,
    /// Columns never unpivoted even though they are not index columns
    pub excluded: Vec<String>,
}

impl InteractionOptions {
    /// Every canonical name the map produces, nothing excluded
    pub fn from_map(interactions: &InteractionMap) -> Self {
        Self {
            features: interactions.feature_names(),
            excluded: Vec::new(),
        }
    }
}

/// Both outputs of the interaction stage
#[derive(Debug, Clone)]
pub struct InteractionTables {
    /// Long form: index columns, `interaction_value`, `interaction_mapping`
    pub interactions_mapped: DataFrame,
    /// Wide form: index columns plus one column per declared feature
    pub model_input: DataFrame,
    /// Raw interaction columns the map has no canonical name for
    pub unmapped_types: Vec<String>,
}

pub fn map_interactions(
    collapsed: DataFrame,
    interactions: &InteractionMap,
    mode: PipelineMode,
    options: &InteractionOptions,
) -> Result<InteractionTables> {
    let table = "categorical variables mapped data";
    let index = mode.index_columns();
    require_columns(&collapsed, table, &index)?;

    let mut collapsed = collapsed;
    if !mode.has_label() && has_column(&collapsed, APP_COMPLETE_FLAG) {
        warn!("Dropping {} from inference input", APP_COMPLETE_FLAG);
        collapsed = collapsed.drop(APP_COMPLETE_FLAG)?;
    }

    // Unpivot keys follow NON_INTERACTION_COLUMNS order, not the input's.
    let id_columns: Vec<String> = NON_INTERACTION_COLUMNS
        .iter()
        .filter(|c| has_column(&collapsed, c))
        .map(|c| c.to_string())
        .collect();
    let interaction_columns: Vec<String> = collapsed
        .get_column_names()
        .into_iter()
        .filter(|c| !NON_INTERACTION_COLUMNS.contains(c))
        .filter(|c| !options.excluded.iter().any(|e| e.as_str() == *c))
        .map(String::from)
        .collect();

    let unmapped_types: Vec<String> = interaction_columns
        .iter()
        .filter(|c| interactions.get(c).is_none())
        .cloned()
        .collect();
    if !unmapped_types.is_empty() {
        warn!(
            "{} interaction column(s) have no canonical name and are left out of model_input: {}",
            unmapped_types.len(),
            unmapped_types.iter().join(", ")
        );
    }
    debug!(
        "Unpivoting {} interaction columns over {} rows",
        interaction_columns.len(),
        collapsed.height()
    );

    let long = unpivot(collapsed.lazy(), &id_columns, &interaction_columns)?;

    let mut mapped_select: Vec<Expr> = id_columns.iter().map(|c| col(c)).collect();
    mapped_select.push(col(INTERACTION_VALUE));
    mapped_select.push(col(INTERACTION_MAPPING));
    let interactions_mapped = long
        .join(
            interactions.to_frame()?.lazy(),
            [col(INTERACTION_TYPE)],
            [col(INTERACTION_TYPE)],
            JoinArgs::new(JoinType::Left),
        )
        .select(mapped_select)
        .collect()?;

    let model_input = pivot_features(&interactions_mapped, &index, &options.features)?;

    Ok(InteractionTables {
        interactions_mapped,
        model_input,
        unmapped_types,
    })
}

/// Long form with one row per (input row, interaction column); nulls count as 0.
fn unpivot(lf: LazyFrame, id_columns: &[String], value_columns: &[String]) -> Result<LazyFrame> {
    let project = |type_name: Expr, value: Expr| -> Vec<Expr> {
        let mut exprs: Vec<Expr> = id_columns.iter().map(|c| col(c)).collect();
        exprs.push(type_name.alias(INTERACTION_TYPE));
        exprs.push(value.alias(INTERACTION_VALUE));
        exprs
    };

    if value_columns.is_empty() {
        return Ok(lf
            .select(project(lit(""), lit(0.0)))
            .limit(0));
    }

    let parts: Vec<LazyFrame> = value_columns
        .iter()
        .map(|c| {
            lf.clone().select(project(
                lit(c.as_str()),
                col(c).cast(DataType::Float64).fill_null(lit(0.0)),
            ))
        })
        .collect();
    Ok(concat(parts, UnionArgs::default())?)
}

/// Sum `interaction_value` per index group into one column per feature.
/// A feature with no contributing rows in a group is 0.
fn pivot_features(mapped: &DataFrame, index: &[&str], features: &[String]) -> Result<DataFrame> {
    if let Some(clash) = features.iter().find(|f| index.contains(&f.as_str())) {
        return Err(PipelineError::Config(format!(
            "interaction feature {} collides with an index column",
            clash
        )));
    }
    if let Some(duplicate) = features.iter().duplicates().next() {
        return Err(PipelineError::Config(format!(
            "interaction feature {} is declared more than once",
            duplicate
        )));
    }

    let keys: Vec<Expr> = index.iter().map(|c| col(c)).collect();
    let sums: Vec<Expr> = features
        .iter()
        .map(|name| {
            col(INTERACTION_VALUE)
                .filter(col(INTERACTION_MAPPING).eq(lit(name.as_str())))
                .sum()
                .alias(name)
        })
        .collect();

    Ok(mapped
        .clone()
        .lazy()
        .group_by_stable(keys)
        .agg(sums)
        .collect()?)
}
