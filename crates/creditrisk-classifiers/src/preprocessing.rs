//! Column-wise preprocessing: one-hot encoding and standard scaling.
//!
//! Both transformers learn their state from training data in `fit` and are
//! applied unchanged to any later matrix, so validation folds and the test
//! set never influence the statistics.
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Per-column standardization to zero mean and unit variance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// Columns whose stddev falls below this are only centered.
    const MIN_STD: f64 = 1e-12;

    /// Transform all rows using the fitted statistics and return a new matrix.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        let mut out = x.to_owned();
        for (c, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            col.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(out)
    }
}

/// Fit a `StandardScaler` where rows are samples and columns are features.
pub fn fit_scaler(x: ArrayView2<f64>) -> Result<StandardScaler, PipelineError> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 {
        return Err(PipelineError::EmptyInput("scale"));
    }

    let mut mean = vec![0.0f64; ncols];
    let mut std = vec![0.0f64; ncols];
    for (c, col) in x.axis_iter(Axis(1)).enumerate() {
        let m = col.sum() / nrows as f64;
        let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / nrows as f64;
        let s = var.sqrt();
        mean[c] = m;
        std[c] = if s < StandardScaler::MIN_STD { 1.0 } else { s };
    }

    Ok(StandardScaler { mean, std })
}

/// One-hot encoder over a fixed set of categorical columns.
///
/// Categories are learned per column and sorted ascending. Values not seen
/// during fit encode as an all-zero block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<f64>>,
}

impl OneHotEncoder {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self, PipelineError> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyInput("encode"));
        }
        let categories = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut cats: Vec<f64> = col.to_vec();
                cats.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                cats.dedup();
                cats
            })
            .collect();
        Ok(OneHotEncoder { categories })
    }

    /// Total number of indicator columns produced.
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(|c| c.len()).sum()
    }

    /// Output column names, `<column>_<category>`.
    pub fn feature_names(&self, input_names: &[String]) -> Vec<String> {
        input_names
            .iter()
            .zip(self.categories.iter())
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}_{}", name, format_category(*c))))
            .collect()
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.categories.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.categories.len(),
                found: x.ncols(),
            });
        }
        let mut out = Array2::zeros((x.nrows(), self.n_outputs()));
        let mut offset = 0;
        for (c, cats) in self.categories.iter().enumerate() {
            for (r, &value) in x.column(c).iter().enumerate() {
                if let Some(pos) = cats.iter().position(|&cat| cat == value) {
                    out[(r, offset + pos)] = 1.0;
                }
            }
            offset += cats.len();
        }
        Ok(out)
    }
}

fn format_category(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
