//! Binary classification metrics and the evaluation records written to the
//! metrics report. The positive class is `1`; any ratio with a zero
//! denominator is reported as `0.0`.
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::data_handling::FeatureMatrix;
use crate::error::PipelineError;
use crate::pipeline::FittedPipeline;

/// 2x2 confusion matrix, rows = true label, columns = predicted label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<Self, PipelineError> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: y_true.len(),
                found: y_pred.len(),
            });
        }
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == 1, p == 1) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Mean per-class recall over the classes present in the true labels.
    pub fn balanced_accuracy(&self) -> f64 {
        let positives = self.true_positive + self.false_negative;
        let negatives = self.true_negative + self.false_positive;
        match (positives > 0, negatives > 0) {
            (true, true) => (self.recall() + self.specificity()) / 2.0,
            (true, false) => self.recall(),
            (false, true) => self.specificity(),
            (false, false) => 0.0,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn precision_score(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<f64, PipelineError> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.precision())
}

pub fn recall_score(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<f64, PipelineError> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.recall())
}

pub fn f1_score(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<f64, PipelineError> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.f1_score())
}

pub fn balanced_accuracy_score(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<f64, PipelineError> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.balanced_accuracy())
}

/// Mean of precision and balanced accuracy.
pub fn composite_score(y_true: ArrayView1<u8>, y_pred: ArrayView1<u8>) -> Result<f64, PipelineError> {
    let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
    Ok((cm.precision() + cm.balanced_accuracy()) / 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Train,
    Test,
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DatasetKind::Train => f.write_str("train"),
            DatasetKind::Test => f.write_str("test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub dataset: DatasetKind,
    pub precision: f64,
    pub balanced_accuracy: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl MetricsRecord {
    pub fn from_confusion_matrix(dataset: DatasetKind, cm: &ConfusionMatrix) -> Self {
        MetricsRecord {
            dataset,
            precision: cm.precision(),
            balanced_accuracy: cm.balanced_accuracy(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedCounts {
    pub predicted_0: usize,
    pub predicted_1: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrixRecord {
    pub dataset: DatasetKind,
    pub true_0: PredictedCounts,
    pub true_1: PredictedCounts,
}

impl ConfusionMatrixRecord {
    pub fn from_confusion_matrix(dataset: DatasetKind, cm: &ConfusionMatrix) -> Self {
        ConfusionMatrixRecord {
            dataset,
            true_0: PredictedCounts {
                predicted_0: cm.true_negative,
                predicted_1: cm.false_positive,
            },
            true_1: PredictedCounts {
                predicted_0: cm.false_negative,
                predicted_1: cm.true_positive,
            },
        }
    }
}

/// One line of the metrics report, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EvaluationRecord {
    #[serde(rename = "metrics")]
    Metrics(MetricsRecord),
    #[serde(rename = "cm_matrix")]
    ConfusionMatrix(ConfusionMatrixRecord),
}

impl EvaluationRecord {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            EvaluationRecord::Metrics(m) => m.dataset,
            EvaluationRecord::ConfusionMatrix(cm) => cm.dataset,
        }
    }
}

pub fn metrics_from_predictions(
    dataset: DatasetKind,
    y_true: ArrayView1<u8>,
    y_pred: ArrayView1<u8>,
) -> Result<MetricsRecord, PipelineError> {
    let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
    Ok(MetricsRecord::from_confusion_matrix(dataset, &cm))
}

pub fn confusion_matrix_from_predictions(
    dataset: DatasetKind,
    y_true: ArrayView1<u8>,
    y_pred: ArrayView1<u8>,
) -> Result<ConfusionMatrixRecord, PipelineError> {
    let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
    Ok(ConfusionMatrixRecord::from_confusion_matrix(dataset, &cm))
}

/// Metrics of `model` on the train and test sets, in that order.
pub fn calculate_metrics(
    model: &FittedPipeline,
    x_train: &FeatureMatrix,
    y_train: ArrayView1<u8>,
    x_test: &FeatureMatrix,
    y_test: ArrayView1<u8>,
) -> Result<(MetricsRecord, MetricsRecord), PipelineError> {
    let train_pred = model.predict(x_train)?;
    let test_pred = model.predict(x_test)?;
    Ok((
        metrics_from_predictions(DatasetKind::Train, y_train, train_pred.view())?,
        metrics_from_predictions(DatasetKind::Test, y_test, test_pred.view())?,
    ))
}

/// Confusion matrices of `model` on the train and test sets, in that order.
pub fn calculate_confusion_matrix(
    model: &FittedPipeline,
    x_train: &FeatureMatrix,
    y_train: ArrayView1<u8>,
    x_test: &FeatureMatrix,
    y_test: ArrayView1<u8>,
) -> Result<(ConfusionMatrixRecord, ConfusionMatrixRecord), PipelineError> {
    let train_pred = model.predict(x_train)?;
    let test_pred = model.predict(x_test)?;
    Ok((
        confusion_matrix_from_predictions(DatasetKind::Train, y_train, train_pred.view())?,
        confusion_matrix_from_predictions(DatasetKind::Test, y_test, test_pred.view())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scores_match_hand_computed_values() {
        let y_true = array![1u8, 1, 1, 0, 0, 0, 0, 0];
        let y_pred = array![1u8, 1, 0, 1, 0, 0, 0, 0];
        let cm = ConfusionMatrix::from_predictions(y_true.view(), y_pred.view()).unwrap();
        assert_eq!(
            cm,
            ConfusionMatrix {
                true_negative: 4,
                false_positive: 1,
                false_negative: 1,
                true_positive: 2
            }
        );
        assert!((cm.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.f1_score() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.balanced_accuracy() - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);
        let composite = composite_score(y_true.view(), y_pred.view()).unwrap();
        assert!((composite - (2.0 / 3.0 + (2.0 / 3.0 + 0.8) / 2.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let y_true = array![0u8, 0, 0];
        let y_pred = array![0u8, 0, 0];
        assert_eq!(precision_score(y_true.view(), y_pred.view()).unwrap(), 0.0);
        assert_eq!(recall_score(y_true.view(), y_pred.view()).unwrap(), 0.0);
        assert_eq!(f1_score(y_true.view(), y_pred.view()).unwrap(), 0.0);
        // only the negative class is present, and it is recalled perfectly
        assert_eq!(balanced_accuracy_score(y_true.view(), y_pred.view()).unwrap(), 1.0);
    }

    #[test]
    fn test_records_serialize_with_type_tag() {
        let cm = ConfusionMatrix {
            true_negative: 3,
            false_positive: 1,
            false_negative: 0,
            true_positive: 2,
        };
        let record = EvaluationRecord::ConfusionMatrix(ConfusionMatrixRecord::from_confusion_matrix(DatasetKind::Test, &cm));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"type":"cm_matrix","dataset":"test","true_0":{"predicted_0":3,"predicted_1":1},"true_1":{"predicted_0":0,"predicted_1":2}}"#
        );

        let metrics = EvaluationRecord::Metrics(MetricsRecord::from_confusion_matrix(DatasetKind::Train, &cm));
        let value: serde_json::Value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["type"], "metrics");
        assert_eq!(value["dataset"], "train");
        assert_eq!(value["recall"], 1.0);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let err = ConfusionMatrix::from_predictions(array![0u8, 1].view(), array![0u8].view()).unwrap_err();
        assert_eq!(err, PipelineError::ShapeMismatch { expected: 2, found: 1 });
    }
}
