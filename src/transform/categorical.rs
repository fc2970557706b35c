use super::{has_column, require_columns, zero_filled};
use crate::error::{PipelineError, Result};
use crate::lookups::SignificantLevels;
use crate::schema::{CATEGORICAL_FIELDS, CITY_MAPPED, NULL_FILLED_COLUMNS, OTHERS_LEVEL};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Categorical-collapse stage.
///
/// Every value outside a field's significant set (null included) becomes
/// `"others"`, the lead counters are re-filled, `city_mapped` is dropped now
/// that the tier carries the city signal, and exact duplicate rows are removed
/// keeping the first occurrence.
pub fn collapse_categoricals(tiered: DataFrame, levels: &SignificantLevels) -> Result<DataFrame> {
    require_columns(&tiered, "city tier mapped data", &CATEGORICAL_FIELDS)?;
    require_columns(&tiered, "city tier mapped data", &NULL_FILLED_COLUMNS)?;

    let mut collapse = Vec::with_capacity(CATEGORICAL_FIELDS.len());
    for field in CATEGORICAL_FIELDS {
        let significant = levels
            .for_field(field)
            .ok_or_else(|| PipelineError::Config(format!("no significant levels for {}", field)))?;
        collapse.push(collapse_to_significant(field, significant));
    }
    let refill: Vec<Expr> = NULL_FILLED_COLUMNS.iter().map(|c| zero_filled(c)).collect();

    let mut tiered = tiered;
    if has_column(&tiered, CITY_MAPPED) {
        tiered = tiered.drop(CITY_MAPPED)?;
    }

    let df = tiered
        .lazy()
        .with_columns(collapse)
        .with_columns(refill)
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    Ok(df)
}

fn collapse_to_significant(field: &str, significant: &BTreeSet<String>) -> Expr {
    let levels: Vec<&str> = significant.iter().map(String::as_str).collect();
    let value = col(field).cast(DataType::String);
    when(value.clone().is_in(lit(Series::new("levels", levels))))
        .then(value)
        .otherwise(lit(OTHERS_LEVEL))
        .alias(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FIRST_PLATFORM, FIRST_UTM_MEDIUM, FIRST_UTM_SOURCE};

    fn levels() -> SignificantLevels {
        SignificantLevels {
            platform: ["Level0", "Level1"].iter().map(|s| s.to_string()).collect(),
            medium: ["Level0"].iter().map(|s| s.to_string()).collect(),
            source: BTreeSet::new(),
        }
    }

    fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(String::from))
            .collect()
    }

    #[test]
    fn test_insignificant_levels_collapse_to_others() {
        let tiered = df! [
            "created_date" => ["d1", "d2", "d3"],
            "city_mapped" => ["pune", "agra", "pune"],
            "city_tier" => [1.0, 2.0, 1.0],
            "first_platform_c" => [Some("Level0"), Some("rareplatform"), None],
            "first_utm_medium_c" => ["Level0", "Level0", "Level9"],
            "first_utm_source_c" => ["Level2", "Level0", "Level2"],
            "total_leads_droppped" => [1.0, 0.0, 2.0],
            "referred_lead" => [0.0, 0.0, 1.0]
        ]
        .unwrap();

        let collapsed = collapse_categoricals(tiered, &levels()).unwrap();

        assert_eq!(
            strings(&collapsed, FIRST_PLATFORM),
            vec![Some("Level0".into()), Some("others".into()), Some("others".into())]
        );
        assert_eq!(
            strings(&collapsed, FIRST_UTM_MEDIUM),
            vec![Some("Level0".into()), Some("Level0".into()), Some("others".into())]
        );
        // An empty significance set collapses every value.
        assert!(strings(&collapsed, FIRST_UTM_SOURCE)
            .iter()
            .all(|v| v.as_deref() == Some(OTHERS_LEVEL)));
        assert!(collapsed.column(CITY_MAPPED).is_err());
    }

    #[test]
    fn test_duplicates_removed_after_collapse() {
        // Rows differ only by city and by two insignificant platforms.
        let tiered = df! [
            "created_date" => ["d1", "d1", "d1", "d2"],
            "city_mapped" => ["pune", "mumbai", "pune", "pune"],
            "city_tier" => [1.0, 1.0, 1.0, 1.0],
            "first_platform_c" => ["LevelX", "LevelY", "Level0", "LevelX"],
            "first_utm_medium_c" => ["Level0", "Level0", "Level0", "Level0"],
            "first_utm_source_c" => ["a", "b", "c", "d"],
            "total_leads_droppped" => [Some(1.0), Some(1.0), Some(1.0), None],
            "referred_lead" => [0.0, 0.0, 0.0, 0.0]
        ]
        .unwrap();

        let collapsed = collapse_categoricals(tiered, &levels()).unwrap();

        assert_eq!(collapsed.height(), 3);
        let dates = strings(&collapsed, "created_date");
        assert_eq!(dates, vec![Some("d1".into()), Some("d1".into()), Some("d2".into())]);
        assert_eq!(collapsed.column("total_leads_droppped").unwrap().null_count(), 0);
        assert_eq!(
            strings(&collapsed, FIRST_PLATFORM),
            vec![Some("others".into()), Some("Level0".into()), Some("others".into())]
        );
    }

    #[test]
    fn test_rare_platform_becomes_others() {
        let tiered = df! [
            "city_tier" => [3.0],
            "first_platform_c" => ["rareplatform"],
            "first_utm_medium_c" => ["web"],
            "first_utm_source_c" => ["app"],
            "total_leads_droppped" => [0.0],
            "referred_lead" => [0.0]
        ]
        .unwrap();
        let web_or_app: BTreeSet<String> = ["web", "app"].iter().map(|s| s.to_string()).collect();
        let levels = SignificantLevels {
            platform: web_or_app.clone(),
            medium: web_or_app.clone(),
            source: web_or_app,
        };

        let collapsed = collapse_categoricals(tiered, &levels).unwrap();
        assert_eq!(strings(&collapsed, FIRST_PLATFORM), vec![Some("others".to_string())]);
        assert_eq!(strings(&collapsed, FIRST_UTM_MEDIUM), vec![Some("web".to_string())]);
        assert_eq!(strings(&collapsed, FIRST_UTM_SOURCE), vec![Some("app".to_string())]);
    }

    #[test]
    fn test_missing_categorical_field() {
        let tiered = df! ["first_platform_c" => ["Level0"]].unwrap();
        assert!(matches!(
            collapse_categoricals(tiered, &levels()),
            Err(PipelineError::MissingColumn { .. })
        ));
    }
}
