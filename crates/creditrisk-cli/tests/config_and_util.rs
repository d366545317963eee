//! Integration tests for the training config and util helpers.

use std::path::PathBuf;

use creditrisk_classifiers::config::{ParamValue, ParameterGrid};
use creditrisk_cli::train::input::{load_train_config, TrainConfig};
use creditrisk_cli::util::{html_report_path, validate_csv_or_zip_file};

// ---------------------------------------------------------------------------
// validate_csv_or_zip_file
// ---------------------------------------------------------------------------

#[test]
fn validate_csv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_csv_or_zip_file(path.to_str().unwrap()).is_ok());
}

#[test]
fn validate_zipped_csv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train_data.csv.zip");
    std::fs::File::create(&path).unwrap();
    assert!(validate_csv_or_zip_file(path.to_str().unwrap()).is_ok());
}

#[test]
fn validate_wrong_extension_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.tsv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_csv_or_zip_file(path.to_str().unwrap()).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_csv_or_zip_file("/nonexistent/path/data.csv.zip").is_err());
}

#[test]
fn html_report_sits_next_to_metrics() {
    assert_eq!(
        html_report_path("files/output/metrics.json"),
        PathBuf::from("files/output/metrics.html")
    );
    assert_eq!(html_report_path("metrics.json"), PathBuf::from("metrics.html"));
}

// ---------------------------------------------------------------------------
// TrainConfig defaults & serialization
// ---------------------------------------------------------------------------

#[test]
fn train_config_default_values() {
    let cfg = TrainConfig::default();
    assert_eq!(cfg.train_data, "files/input/train_data.csv.zip");
    assert_eq!(cfg.test_data, "files/input/test_data.csv.zip");
    assert_eq!(cfg.model_output, "files/models/model.bin.zst");
    assert_eq!(cfg.metrics_output, "files/output/metrics.json");
    assert_eq!(cfg.target_column, "default");
    assert_eq!(cfg.cv_folds, 10);
    assert_eq!(cfg.max_iter, 15000);
    assert_eq!(cfg.param_grid.len(), 1);
    assert!(cfg.validate().is_ok());
}

#[test]
fn train_config_round_trips_json() {
    let cfg = TrainConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("model__hidden_layer_sizes"));
    let cfg2: TrainConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(cfg, cfg2);
}

#[test]
fn partial_config_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"cv_folds": 5, "tracking_dir": null}"#).unwrap();

    let cfg = load_train_config(&path).unwrap();
    assert_eq!(cfg.cv_folds, 5);
    assert_eq!(cfg.tracking_dir, None);
    assert_eq!(cfg.param_grid, TrainConfig::default().param_grid);
}

#[test]
fn malformed_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_train_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

// ---------------------------------------------------------------------------
// TrainConfig validation
// ---------------------------------------------------------------------------

#[test]
fn validation_rejects_bad_settings() {
    let single_fold = TrainConfig {
        cv_folds: 1,
        ..TrainConfig::default()
    };
    assert!(single_fold.validate().is_err());

    let no_threads = TrainConfig {
        n_jobs: Some(0),
        ..TrainConfig::default()
    };
    assert!(no_threads.validate().is_err());

    let empty_values = TrainConfig {
        param_grid: ParameterGrid::new().with("model__alpha", vec![]),
        ..TrainConfig::default()
    };
    assert!(empty_values.validate().is_err());

    let unknown_key = TrainConfig {
        param_grid: ParameterGrid::new().with("model__kernel", vec![ParamValue::Text("rbf".to_string())]),
        ..TrainConfig::default()
    };
    let err = unknown_key.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("kernel"));

    let bad_value = TrainConfig {
        param_grid: ParameterGrid::new().with("model__solver", vec![ParamValue::Text("lbfgs".to_string())]),
        ..TrainConfig::default()
    };
    assert!(bad_value.validate().is_err());

    let huge_seed = TrainConfig {
        random_state: Some(u64::MAX),
        ..TrainConfig::default()
    };
    let err = huge_seed.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("random_state must be at most"));

    let max_seed = TrainConfig {
        random_state: Some(i64::MAX as u64),
        ..TrainConfig::default()
    };
    assert!(max_seed.validate().is_ok());
}

#[test]
fn random_state_is_pinned_into_the_grid() {
    let seeded = TrainConfig {
        random_state: Some(42),
        ..TrainConfig::default()
    };
    let combos = seeded.effective_param_grid().combinations();
    assert_eq!(combos[0]["model__random_state"], ParamValue::Int(42));

    let explicit = TrainConfig {
        random_state: Some(42),
        param_grid: TrainConfig::default()
            .param_grid
            .with("model__random_state", vec![ParamValue::Int(1)]),
        ..TrainConfig::default()
    };
    let combos = explicit.effective_param_grid().combinations();
    assert_eq!(combos[0]["model__random_state"], ParamValue::Int(1));
}
