use lead_scoring::schema::{
    APP_COMPLETE_FLAG, CITY_MAPPED, CITY_TIER, CREATED_DATE, FIRST_PLATFORM, FIRST_UTM_MEDIUM,
    FIRST_UTM_SOURCE, INTERACTION_MAPPING, INTERACTION_VALUE, MODEL_INTERACTION_FEATURES,
    RAW_INTERACTION_COLUMNS, REFERRED_LEAD, TOTAL_LEADS_DROPPED,
};
use lead_scoring::store::StoreStatus;
use lead_scoring::validation::SchemaCheck;
use lead_scoring::{
    Pipeline, PipelineConfig, PipelineError, PipelineMode, SqliteTableStore, Stage, TableStore,
};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// (created_date, city, platform, medium, source, leads_dropped, referred, label)
const LEADS: [(&str, &str, &str, &str, &str, &str, &str, &str); 5] = [
    ("2021-07-01 10:00:00", "mumbai", "Level0", "Level0", "Level2", "1", "0", "1"),
    ("2021-07-01 10:00:00", "mumbai", "Level0", "Level0", "Level2", "1", "0", "1"),
    ("2021-07-01 11:30:00", "Nowhereville", "rareplatform", "Level2", "Level0", "", "1", "0"),
    ("2021-07-02 09:15:00", "agra", "Level1", "Level77", "", "2", "", "0"),
    ("2021-07-03 18:45:00", "", "Level3", "Level5", "Level4", "0", "0", "1"),
];

fn write_raw_csv(path: &Path, with_label: bool) {
    let mut header = vec![
        CREATED_DATE,
        CITY_MAPPED,
        FIRST_PLATFORM,
        FIRST_UTM_MEDIUM,
        FIRST_UTM_SOURCE,
        TOTAL_LEADS_DROPPED,
        REFERRED_LEAD,
    ];
    if with_label {
        header.push(APP_COMPLETE_FLAG);
    }
    header.extend(RAW_INTERACTION_COLUMNS);

    let mut lines = vec![header.join(",")];
    for (row, lead) in LEADS.iter().enumerate() {
        let (date, city, platform, medium, source, dropped, referred, label) = *lead;
        let mut cells = vec![date, city, platform, medium, source, dropped, referred];
        if with_label {
            cells.push(label);
        }
        let mut line = cells.join(",");
        // Rows 0 and 1 are exact duplicates; row 2 leaves every interaction empty.
        let pattern = [0usize, 0, 0, 1, 2][row];
        for (idx, _) in RAW_INTERACTION_COLUMNS.iter().enumerate() {
            let value = if row == 2 {
                ""
            } else if (idx + pattern) % 3 == 0 {
                "1"
            } else {
                "0"
            };
            line.push(',');
            line.push_str(value);
        }
        lines.push(line);
    }
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn setup(mode: PipelineMode) -> (TempDir, PipelineConfig) {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    write_raw_csv(&data_dir.join("leadscoring.csv"), mode.has_label());

    let config = PipelineConfig {
        db_path: dir.path().join("database"),
        data_directory: data_dir,
        mode,
        ..PipelineConfig::default()
    };
    (dir, config)
}

fn f64_column(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

#[test]
fn test_training_run_end_to_end() {
    let (_dir, config) = setup(PipelineMode::Training);
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    let report = pipeline.run().unwrap();

    assert_eq!(report.store_status, StoreStatus::Created);
    assert_eq!(report.raw_schema, SchemaCheck::Conforms);
    assert_eq!(report.model_input_schema, SchemaCheck::Conforms);
    let stages: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(stages, Stage::ALL.iter().map(|s| s.name()).collect::<Vec<_>>());

    let loaded = store.read_table("loaded_data").unwrap();
    assert_eq!(loaded.height(), LEADS.len());
    assert_eq!(loaded.column(TOTAL_LEADS_DROPPED).unwrap().null_count(), 0);
    assert_eq!(loaded.column(REFERRED_LEAD).unwrap().null_count(), 0);

    let tiered = store.read_table("city_tier_mapped").unwrap();
    assert_eq!(f64_column(&tiered, CITY_TIER), vec![1.0, 1.0, 3.0, 2.0, 3.0]);

    let collapsed = store.read_table("categorical_variables_mapped").unwrap();
    assert_eq!(collapsed.height(), LEADS.len() - 1);
    assert!(!collapsed.get_column_names().contains(&CITY_MAPPED));
    let platforms: Vec<Option<&str>> = collapsed.column(FIRST_PLATFORM).unwrap().str().unwrap().into_iter().collect();
    assert_eq!(
        platforms,
        vec![Some("Level0"), Some("others"), Some("Level1"), Some("Level3")]
    );
    let sources: Vec<Option<&str>> = collapsed.column(FIRST_UTM_SOURCE).unwrap().str().unwrap().into_iter().collect();
    assert_eq!(sources[2], Some("others"));

    let model_input = store.read_table("model_input").unwrap();
    assert_eq!(model_input.height(), 4);
    let expected_columns: Vec<String> = pipeline.registry().model_input.columns;
    assert_eq!(
        model_input.get_column_names(),
        expected_columns.iter().map(String::as_str).collect::<Vec<_>>()
    );
    // The lead with no interactions at all still gets a zero row.
    for feature in MODEL_INTERACTION_FEATURES {
        assert_eq!(f64_column(&model_input, feature)[1], 0.0);
    }
}

#[test]
fn test_interaction_values_are_conserved_per_group() {
    let (_dir, config) = setup(PipelineMode::Training);
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();
    pipeline.run().unwrap();

    let long = store.read_table("interactions_mapped").unwrap();
    assert_eq!(long.height(), 4 * RAW_INTERACTION_COLUMNS.len());
    assert_eq!(long.column(INTERACTION_MAPPING).unwrap().null_count(), 0);
    let wide = store.read_table("model_input").unwrap();

    let keys: Vec<Expr> = PipelineMode::Training
        .index_columns()
        .iter()
        .map(|c| col(c))
        .collect();
    let long_totals = long
        .lazy()
        .group_by_stable(keys.clone())
        .agg([col(INTERACTION_VALUE).sum().alias("long_total")]);
    let row_total = MODEL_INTERACTION_FEATURES
        .iter()
        .map(|f| col(f))
        .reduce(|a, b| a + b)
        .unwrap();
    let totals = wide
        .clone()
        .lazy()
        .with_column(row_total.alias("wide_total"))
        .join(long_totals, keys.clone(), keys, JoinArgs::new(JoinType::Left))
        .collect()
        .unwrap();

    assert_eq!(totals.height(), wide.height());
    let long_per_group = f64_column(&totals, "long_total");
    assert_eq!(long_per_group, f64_column(&totals, "wide_total"));
    assert!(long_per_group.iter().sum::<f64>() > 0.0);
    // The lead with no interactions contributes a zero group.
    assert_eq!(long_per_group[1], 0.0);
}

#[test]
fn test_rerun_is_idempotent() {
    let (_dir, config) = setup(PipelineMode::Training);
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    pipeline.run().unwrap();
    let first = store.read_table("model_input").unwrap();
    let first_long = store.read_table("interactions_mapped").unwrap();

    let report = pipeline.run().unwrap();
    assert_eq!(report.store_status, StoreStatus::AlreadyExists);
    assert!(store.read_table("model_input").unwrap().equals_missing(&first));
    assert!(store.read_table("interactions_mapped").unwrap().equals_missing(&first_long));
}

#[test]
fn test_inference_run_has_no_label() {
    let (_dir, config) = setup(PipelineMode::Inference);
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    let report = pipeline.run().unwrap();
    assert!(report.model_input_schema.is_conforming());

    let columns = store.table_columns("model_input").unwrap();
    assert!(!columns.iter().any(|c| c == APP_COMPLETE_FLAG));
    assert_eq!(columns.len(), 7 + MODEL_INTERACTION_FEATURES.len());

    let (encode_report, check) = pipeline.encode().unwrap();
    assert!(check.is_conforming());
    assert_eq!(encode_report.outputs[0].rows, 4);
    assert!(store.table_exists("features").unwrap());
}

#[test]
fn test_training_run_without_label_stops_at_interactions() {
    let (_dir, mut config) = setup(PipelineMode::Inference);
    config.mode = PipelineMode::Training;
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == APP_COMPLETE_FLAG));
    assert!(store.table_exists("categorical_variables_mapped").unwrap());
    assert!(!store.table_exists("model_input").unwrap());
}

#[test]
fn test_stage_on_missing_store() {
    let (_dir, config) = setup(PipelineMode::Training);
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    let err = pipeline.run_stage(Stage::CityTier).unwrap_err();
    assert!(matches!(err, PipelineError::StoreNotFound(_)));
    assert!(!store.store_exists());
}

#[test]
fn test_missing_raw_file() {
    let (dir, mut config) = setup(PipelineMode::Training);
    config.data_file_name = "absent.csv".to_string();
    let store = SqliteTableStore::new(config.db_file());
    let pipeline = Pipeline::from_config(&store, config).unwrap();

    assert!(matches!(pipeline.validate_raw().unwrap(), SchemaCheck::NotFound { .. }));
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::SourceNotFound(_)));
    // The store is still bootstrapped before the load fails.
    assert!(dir.path().join("database").join("lead_scoring_data_cleaning.db").is_file());
}
