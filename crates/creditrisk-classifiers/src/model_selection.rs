//! Stratified cross-validation and exhaustive grid search.
use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};
use ndarray::{Array1, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ParamSet, ParameterGrid};
use crate::data_handling::FeatureMatrix;
use crate::error::PipelineError;
use crate::metrics::{balanced_accuracy_score, ConfusionMatrix, DatasetKind, MetricsRecord};
use crate::persistence::encode_model;
use crate::pipeline::{FittedPipeline, Pipeline};
use crate::tracking::ExperimentTracker;

pub const DEFAULT_CV_FOLDS: usize = 10;

/// K-fold splitter that preserves the class proportions in every fold.
///
/// Samples are not shuffled: each class is dealt to the folds in its original
/// order, so the split is fully determined by the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Result<Self, PipelineError> {
        if n_splits < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "cross-validation needs at least 2 folds, got {}",
                n_splits
            )));
        }
        Ok(StratifiedKFold { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Returns `(train_indices, test_indices)` for every fold.
    pub fn split(&self, y: ArrayView1<u8>) -> Result<Vec<(Vec<usize>, Vec<usize>)>, PipelineError> {
        let n_samples = y.len();
        if self.n_splits > n_samples {
            return Err(PipelineError::InvalidParameter(format!(
                "n_splits={} cannot exceed the number of samples ({})",
                self.n_splits, n_samples
            )));
        }

        let mut members: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            members.entry(label).or_default().push(i);
        }
        let smallest = members.values().map(|m| m.len()).min().unwrap_or(0);
        if smallest < self.n_splits {
            log::warn!(
                "The least populated class has only {} members, fewer than n_splits={}",
                smallest,
                self.n_splits
            );
        }

        // Per-fold class counts follow the labels sorted by class and dealt
        // round-robin over the folds.
        let sorted: Vec<u8> = members
            .iter()
            .flat_map(|(&label, m)| std::iter::repeat(label).take(m.len()))
            .collect();
        let mut test_fold = vec![0usize; n_samples];
        for (&label, indices) in &members {
            let mut cursor = 0;
            for fold in 0..self.n_splits {
                let count = sorted
                    .iter()
                    .skip(fold)
                    .step_by(self.n_splits)
                    .filter(|&&l| l == label)
                    .count();
                for &idx in &indices[cursor..cursor + count] {
                    test_fold[idx] = fold;
                }
                cursor += count;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) = (0..n_samples).partition(|&i| test_fold[i] == fold);
                (train, test)
            })
            .collect())
    }
}

/// Cross-validation outcome of one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_index: usize,
    pub best_params: ParamSet,
    /// Mean cross-validated balanced accuracy of the winner.
    pub best_score: f64,
    /// The winner refit on the full training set.
    pub best_estimator: FittedPipeline,
    pub cv_results: Vec<CvResult>,
    /// Training-set metrics of `best_estimator`.
    pub train_metrics: MetricsRecord,
    /// `(precision + balanced_accuracy) / 2` on the training predictions.
    pub composite_score: f64,
}

/// Exhaustive search over a [`ParameterGrid`] scored by mean balanced
/// accuracy across stratified folds.
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    pipeline: Pipeline,
    param_grid: ParameterGrid,
    cv: StratifiedKFold,
    n_jobs: Option<usize>,
}

impl GridSearchCV {
    pub fn new(pipeline: Pipeline, param_grid: ParameterGrid, cv: usize) -> Result<Self, PipelineError> {
        param_grid.validate()?;
        Ok(GridSearchCV {
            pipeline,
            param_grid,
            cv: StratifiedKFold::new(cv)?,
            n_jobs: None,
        })
    }

    /// Worker threads for the search; `None` uses every available core.
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn fit(&self, x: &FeatureMatrix, y: ArrayView1<u8>, tracker: &dyn ExperimentTracker) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: x.nrows(),
                found: y.len(),
            }
            .into());
        }

        let combinations = self.param_grid.combinations();
        let candidates: Vec<Pipeline> = combinations
            .iter()
            .map(|params| self.pipeline.set_params(params))
            .collect::<Result<_, _>>()?;
        let folds = self.cv.split(y)?;

        log::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            folds.len() * candidates.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs.unwrap_or(0))
            .build()
            .context("Failed to build grid search thread pool")?;

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let start_time = Instant::now();
        let scores: Vec<f64> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| -> Result<f64, PipelineError> {
                    let (train_idx, test_idx) = &folds[f];
                    let y_train = y.select(Axis(0), train_idx);
                    let y_test = y.select(Axis(0), test_idx);
                    let fitted = candidates[c].fit(&x.select_rows(train_idx), y_train.view())?;
                    let y_pred = fitted.predict(&x.select_rows(test_idx))?;
                    let score = balanced_accuracy_score(y_test.view(), y_pred.view())?;
                    log::debug!("candidate {} fold {}: balanced_accuracy={:.4}", c, f, score);
                    Ok(score)
                })
                .collect::<Result<Vec<f64>, PipelineError>>()
        })?;
        log::info!("Cross-validation finished in {:.2?}", start_time.elapsed());

        let cv_results: Vec<CvResult> = combinations
            .into_iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| {
                let fold_scores = Array1::from_vec(fold_scores.to_vec());
                CvResult {
                    params,
                    mean_score: fold_scores.mean().unwrap_or(0.0),
                    std_score: fold_scores.std(0.0),
                    fold_scores: fold_scores.to_vec(),
                }
            })
            .collect();

        let mut best_index = 0;
        for (i, result) in cv_results.iter().enumerate() {
            if result.mean_score > cv_results[best_index].mean_score {
                best_index = i;
            }
        }
        let best = &cv_results[best_index];
        log::info!(
            "Best candidate {}: balanced_accuracy={:.4} (+/- {:.4}) with {}",
            best_index,
            best.mean_score,
            best.std_score,
            format_params(&best.params)
        );

        let best_estimator = candidates[best_index].fit(x, y).context("Refitting the best candidate failed")?;
        let y_pred = best_estimator.predict(x)?;
        let cm = ConfusionMatrix::from_predictions(y, y_pred.view())?;
        let train_metrics = MetricsRecord::from_confusion_matrix(DatasetKind::Train, &cm);
        let composite_score = (train_metrics.precision + train_metrics.balanced_accuracy) / 2.0;

        let result = GridSearchResult {
            best_index,
            best_params: best.params.clone(),
            best_score: best.mean_score,
            best_estimator,
            cv_results,
            train_metrics,
            composite_score,
        };
        log_to_tracker(tracker, &result);
        Ok(result)
    }
}

pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_to_tracker(tracker: &dyn ExperimentTracker, result: &GridSearchResult) {
    for (key, value) in &result.best_params {
        warn_on_failure(tracker.log_param(key, &value.to_string()), key);
    }

    let m = &result.train_metrics;
    for (name, value) in [
        ("precision", m.precision),
        ("balanced_accuracy", m.balanced_accuracy),
        ("recall", m.recall),
        ("f1_score", m.f1_score),
    ] {
        warn_on_failure(tracker.log_metric(name, value), name);
    }

    match encode_model(&result.best_estimator) {
        Ok(bytes) => warn_on_failure(tracker.log_artifact("model.bin.zst", &bytes), "model"),
        Err(e) => log::warn!("Could not encode model for tracking: {:#}", e),
    }
}

fn warn_on_failure(result: Result<()>, what: &str) {
    if let Err(e) = result {
        log::warn!("Experiment tracking failed for '{}': {:#}", what, e);
    }
}
