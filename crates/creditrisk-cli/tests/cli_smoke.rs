//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `creditrisk` binary to verify that
//! argument parsing, error handling and a small end-to-end training run work.

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use zip::write::FileOptions;

fn cmd() -> Command {
    Command::cargo_bin("creditrisk").unwrap()
}

const HEADER: &str = "ID,LIMIT_BAL,SEX,EDUCATION,MARRIAGE,AGE,PAY_0,BILL_AMT1,PAY_AMT1,default payment next month";

fn write_zipped_table(path: &Path, n_rows: usize, offset: usize) {
    write_zipped_csv(path, &table_csv(n_rows, offset));
}

/// Clients with PAY_0 >= 2 default. Every 9th row has EDUCATION = 0 and is
/// removed by cleaning.
fn table_csv(n_rows: usize, offset: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for r in 0..n_rows {
        let i = r + offset;
        let pay_0 = (i % 5) as i64 - 1;
        let education = if i % 9 == 8 { 0 } else { 1 + i % 4 };
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            i + 1,
            10_000 * (1 + i % 7),
            1 + i % 2,
            education,
            1 + (i / 2) % 2,
            21 + i % 30,
            pay_0,
            1_000 * (i % 11),
            500 * (i % 13),
            u8::from(pay_0 >= 2)
        ));
    }
    csv
}

/// Same table with one column removed.
fn table_csv_without(n_rows: usize, offset: usize, column: &str) -> String {
    let csv = table_csv(n_rows, offset);
    let idx = HEADER.split(',').position(|c| c == column).unwrap();
    csv.lines()
        .map(|line| {
            let cells: Vec<&str> = line.split(',').enumerate().filter(|(i, _)| *i != idx).map(|(_, c)| c).collect();
            cells.join(",") + "\n"
        })
        .collect()
}

fn write_zipped_csv(path: &Path, csv: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("data.csv", FileOptions::default()).unwrap();
    zip.write_all(csv.as_bytes()).unwrap();
    zip.finish().unwrap();
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files/input")).unwrap();
        write_zipped_table(&dir.path().join("files/input/train_data.csv.zip"), 72, 0);
        write_zipped_table(&dir.path().join("files/input/test_data.csv.zip"), 30, 1000);
        Workspace { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write_config(&self) -> PathBuf {
        let config = serde_json::json!({
            "train_data": self.path("files/input/train_data.csv.zip"),
            "test_data": self.path("files/input/test_data.csv.zip"),
            "model_output": self.path("files/models/model.bin.zst"),
            "metrics_output": self.path("files/output/metrics.json"),
            "cv_folds": 3,
            "n_jobs": 2,
            "max_iter": 200,
            "random_state": 7,
            "tracking_dir": self.path("mlruns"),
            "param_grid": {
                "select_k_best__k": [5],
                "pca__n_components": [3],
                "model__hidden_layer_sizes": [[8]],
                "model__learning_rate_init": [0.01]
            }
        });
        let path = self.path("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        path
    }
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("evaluate"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("creditrisk"));
}

// ---------------------------------------------------------------------------
// Train subcommand
// ---------------------------------------------------------------------------

#[test]
fn train_nonexistent_config_errors() {
    cmd()
        .args(["train", "/nonexistent/config.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn train_without_config_reports_missing_default_inputs() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .arg("train")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No config file provided"))
        .stderr(predicate::str::contains("files/input/train_data.csv.zip"));
}

#[test]
fn train_rejects_single_fold_before_loading_data() {
    let ws = Workspace::new();
    let config = ws.write_config();
    cmd()
        .arg("train")
        .arg(&config)
        .args(["--cv", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cv_folds must be at least 2"));
    assert!(!ws.path("files/models/model.bin.zst").exists());
}

#[test]
fn train_rejects_non_table_input() {
    let ws = Workspace::new();
    let config = ws.write_config();
    let bogus = ws.path("train.txt");
    std::fs::write(&bogus, "x").unwrap();
    cmd()
        .arg("train")
        .arg(&config)
        .arg("-d")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains(".csv or .zip"));
}

#[test]
fn train_with_mismatched_test_columns_leaves_no_outputs() {
    let ws = Workspace::new();
    write_zipped_csv(
        &ws.path("files/input/test_data.csv.zip"),
        &table_csv_without(30, 1000, "BILL_AMT1"),
    );
    let config = ws.write_config();

    cmd()
        .arg("train")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Column 'BILL_AMT1' not found"));
    assert!(!ws.path("files/models/model.bin.zst").exists());
    assert!(!ws.path("files/output/metrics.json").exists());
}

#[test]
fn train_then_evaluate_end_to_end() {
    let ws = Workspace::new();
    let config = ws.write_config();

    cmd()
        .arg("train")
        .arg(&config)
        .env("CREDITRISK_LOG", "error")
        .assert()
        .success();

    let model = ws.path("files/models/model.bin.zst");
    assert!(model.exists());
    assert!(ws.path("files/output/metrics.html").exists());

    let report = std::fs::read_to_string(ws.path("files/output/metrics.json")).unwrap();
    let lines: Vec<serde_json::Value> = report.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 4);
    let order: Vec<(String, String)> = lines
        .iter()
        .map(|v| (v["type"].as_str().unwrap().to_string(), v["dataset"].as_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("metrics".to_string(), "train".to_string()),
            ("metrics".to_string(), "test".to_string()),
            ("cm_matrix".to_string(), "train".to_string()),
            ("cm_matrix".to_string(), "test".to_string()),
        ]
    );

    // one tracked run holding the winning params and training metrics
    let runs: Vec<_> = std::fs::read_dir(ws.path("mlruns")).unwrap().collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    assert_eq!(std::fs::read_to_string(run_dir.join("params/pca__n_components")).unwrap(), "3");
    assert!(run_dir.join("metrics/balanced_accuracy").exists());
    assert!(run_dir.join("artifacts/model.bin.zst").exists());

    cmd()
        .arg("evaluate")
        .arg("--model")
        .arg(&model)
        .arg("--data")
        .arg(ws.path("files/input/test_data.csv.zip"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"metrics""#))
        .stdout(predicate::str::contains(r#""type":"cm_matrix""#));
}

// ---------------------------------------------------------------------------
// Evaluate subcommand
// ---------------------------------------------------------------------------

#[test]
fn evaluate_requires_model_and_data() {
    cmd().arg("evaluate").assert().failure();
}

#[test]
fn evaluate_nonexistent_model_errors() {
    let ws = Workspace::new();
    cmd()
        .args(["evaluate", "--model", "/nonexistent/model.bin.zst", "--data"])
        .arg(ws.path("files/input/test_data.csv.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Evaluation failed"));
}
