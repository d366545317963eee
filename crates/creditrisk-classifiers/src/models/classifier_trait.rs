use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::PipelineError;

/// Decision threshold applied to positive-class probabilities.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// A small trait abstraction for binary classifier models used at the end of
/// a pipeline. Labels use 0 for "no default" and 1 for "default".
pub trait ClassifierModel {
    /// Fit the model on a dense feature matrix.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), PipelineError>;

    /// Probability of the positive class for every row.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PipelineError>;

    /// Hard 0/1 predictions.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>, PipelineError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| u8::from(p > DECISION_THRESHOLD)))
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
