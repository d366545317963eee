use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use creditrisk_classifiers::config::{default_param_grid, ParamValue, ParameterGrid};
use creditrisk_classifiers::data_handling::TARGET_COLUMN;
use creditrisk_classifiers::model_selection::DEFAULT_CV_FOLDS;
use creditrisk_classifiers::pipeline::{create_pipeline, DEFAULT_MAX_ITER};

use crate::util::validate_csv_or_zip_file;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub train_data: String,
    pub test_data: String,
    pub model_output: String,
    pub metrics_output: String,
    pub target_column: String,
    pub cv_folds: usize,
    /// Grid search threads; `None` uses every core.
    pub n_jobs: Option<usize>,
    pub max_iter: usize,
    /// Seed for the MLP weights and batch shuffling.
    pub random_state: Option<u64>,
    pub param_grid: ParameterGrid,
    /// Root of the local experiment store; `None` disables tracking.
    pub tracking_dir: Option<String>,
    pub experiment_name: String,
    pub report_html: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            train_data: String::from("files/input/train_data.csv.zip"),
            test_data: String::from("files/input/test_data.csv.zip"),
            model_output: String::from("files/models/model.bin.zst"),
            metrics_output: String::from("files/output/metrics.json"),
            target_column: TARGET_COLUMN.to_string(),
            cv_folds: DEFAULT_CV_FOLDS,
            n_jobs: None,
            max_iter: DEFAULT_MAX_ITER,
            random_state: None,
            param_grid: default_param_grid(),
            tracking_dir: Some(String::from("mlruns")),
            experiment_name: String::from("credit-default"),
            report_html: true,
        }
    }
}

pub fn load_train_config<P: AsRef<Path>>(path: P) -> Result<TrainConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: TrainConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

impl TrainConfig {
    /// Load the config file if one is given, then apply CLI overrides and
    /// validate the result.
    pub fn from_arguments(config_path: Option<&Path>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_train_config(path)?,
            None => TrainConfig::default(),
        };

        // Apply CLI overrides
        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        if let Some(test_data) = matches.get_one::<String>("test_data") {
            config.test_data = test_data.clone();
        }
        if let Some(model_output) = matches.get_one::<String>("model_output") {
            config.model_output = model_output.clone();
        }
        if let Some(metrics_output) = matches.get_one::<String>("metrics_output") {
            config.metrics_output = metrics_output.clone();
        }
        if let Some(cv) = matches.get_one::<usize>("cv") {
            config.cv_folds = *cv;
        }
        if let Some(n_jobs) = matches.get_one::<usize>("n_jobs") {
            config.n_jobs = Some(*n_jobs);
        }
        if matches.get_flag("no_tracking") {
            config.tracking_dir = None;
        }
        if matches.get_flag("no_report") {
            config.report_html = false;
        }

        config.validate()?;
        validate_csv_or_zip_file(&config.train_data)?;
        validate_csv_or_zip_file(&config.test_data)?;

        Ok(config)
    }

    /// Reject settings that would only fail once training has started.
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            anyhow::bail!("cv_folds must be at least 2, got {}", self.cv_folds);
        }
        if self.n_jobs == Some(0) {
            anyhow::bail!("n_jobs must be at least 1 when set");
        }
        if self.max_iter == 0 {
            anyhow::bail!("max_iter must be at least 1");
        }
        if let Some(seed) = self.random_state {
            if seed > i64::MAX as u64 {
                anyhow::bail!("random_state must be at most {}, got {}", i64::MAX, seed);
            }
        }
        if self.target_column.trim().is_empty() {
            anyhow::bail!("target_column must not be empty");
        }

        self.param_grid.validate().context("Invalid param_grid")?;
        let template = create_pipeline(&[], self.max_iter);
        for params in self.param_grid.combinations() {
            template.set_params(&params).context("Invalid param_grid")?;
        }
        Ok(())
    }

    /// The grid actually searched: `random_state` is pinned into the model
    /// unless the grid already sets it.
    pub fn effective_param_grid(&self) -> ParameterGrid {
        match self.random_state {
            Some(seed) if !self.param_grid.keys().any(|k| k == "model__random_state") => self
                .param_grid
                .clone()
                .with("model__random_state", vec![ParamValue::Int(seed as i64)]),
            _ => self.param_grid.clone(),
        }
    }
}
