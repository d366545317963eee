use anyhow::{Context, Result};

use creditrisk_classifiers::data_handling::{clean_data, get_features_target};
use creditrisk_classifiers::io::read_dataset;
use creditrisk_classifiers::metrics::{
    confusion_matrix_from_predictions, metrics_from_predictions, DatasetKind, EvaluationRecord,
};
use creditrisk_classifiers::persistence::load_model;

/// Score a persisted model on a labelled table. Returns the metrics record
/// followed by the confusion matrix record.
pub fn run_evaluation(model_path: &str, data_path: &str, target_column: &str) -> Result<Vec<EvaluationRecord>> {
    let model = load_model(model_path)?;
    log::info!("Loaded model from {}", model_path);

    let raw = read_dataset(data_path)?;
    raw.log_input_data_summary("Evaluation");
    let cleaned = clean_data(&raw);
    let (x, y) = get_features_target(&cleaned, target_column)
        .with_context(|| format!("Failed to split evaluation data: {}", data_path))?;

    let y_pred = model.predict(&x)?;
    Ok(vec![
        EvaluationRecord::Metrics(metrics_from_predictions(DatasetKind::Test, y.view(), y_pred.view())?),
        EvaluationRecord::ConfusionMatrix(confusion_matrix_from_predictions(
            DatasetKind::Test,
            y.view(),
            y_pred.view(),
        )?),
    ])
}
