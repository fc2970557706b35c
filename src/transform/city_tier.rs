use super::{has_column, require_columns};
use crate::error::Result;
use crate::lookups::CityTierMapping;
use crate::schema::{CITY_MAPPED, CITY_TIER, DEFAULT_CITY_TIER};
use polars::prelude::*;

/// City-tier stage: `city_tier` is the mapped tier of `city_mapped`, or
/// 3.0 for cities the mapping does not know (including null cities).
pub fn map_city_tier(loaded: DataFrame, tiers: &CityTierMapping) -> Result<DataFrame> {
    require_columns(&loaded, "loaded data", &[CITY_MAPPED])?;

    let mut loaded = loaded;
    if has_column(&loaded, CITY_TIER) {
        loaded = loaded.drop(CITY_TIER)?;
    }

    let city_is_text = loaded.column(CITY_MAPPED)?.dtype() == &DataType::String;
    let mut lf = loaded.lazy();
    if !city_is_text {
        lf = lf.with_column(col(CITY_MAPPED).cast(DataType::String));
    }

    // Left join keeps every loaded row in its original order.
    let df = lf
        .join(
            tiers.to_frame()?.lazy(),
            [col(CITY_MAPPED)],
            [col(CITY_MAPPED)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col(CITY_TIER).fill_null(lit(DEFAULT_CITY_TIER)))
        .collect()?;
    Ok(df)
}
