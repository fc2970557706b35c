use super::{require_columns, zero_filled};
use crate::error::Result;
use crate::schema::NULL_FILLED_COLUMNS;
use polars::prelude::*;

/// Load stage: null-fill the lead counters, pass every other column through.
/// No rows are filtered or deduplicated here.
pub fn load(raw: DataFrame) -> Result<DataFrame> {
    require_columns(&raw, "raw data", &NULL_FILLED_COLUMNS)?;
    let fills: Vec<Expr> = NULL_FILLED_COLUMNS.iter().map(|c| zero_filled(c)).collect();
    Ok(raw.lazy().with_columns(fills).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::schema::{REFERRED_LEAD, TOTAL_LEADS_DROPPED};

    #[test]
    fn test_counters_never_null_after_load() {
        let raw = df! [
            "created_date" => ["2021-07-01", "2021-07-02", "2021-07-03"],
            "city_mapped" => [Some("pune"), None, Some("agra")],
            "total_leads_droppped" => [Some(2.0), None, Some(1.0)],
            "referred_lead" => [None, Some(1i64), None]
        ]
        .unwrap();

        let loaded = load(raw).unwrap();

        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.column(TOTAL_LEADS_DROPPED).unwrap().null_count(), 0);
        assert_eq!(loaded.column(REFERRED_LEAD).unwrap().null_count(), 0);
        let referred: Vec<Option<f64>> = loaded.column(REFERRED_LEAD).unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(referred, vec![Some(0.0), Some(1.0), Some(0.0)]);
        // Untouched columns keep their nulls.
        assert_eq!(loaded.column("city_mapped").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_counter_column() {
        let raw = df! ["total_leads_droppped" => [1.0]].unwrap();
        assert!(matches!(load(raw), Err(PipelineError::MissingColumn { .. })));
    }
}
