use std::time::Instant;

use anyhow::{Context, Result};
use maud::html;

use creditrisk_classifiers::config::ParamSet;
use creditrisk_classifiers::data_handling::{clean_data, get_features_target};
use creditrisk_classifiers::io::read_dataset;
use creditrisk_classifiers::metrics::{calculate_confusion_matrix, calculate_metrics, EvaluationRecord};
use creditrisk_classifiers::model_selection::{format_params, GridSearchCV, GridSearchResult};
use creditrisk_classifiers::persistence::save_model;
use creditrisk_classifiers::pipeline::create_pipeline;
use creditrisk_classifiers::report::html::{confusion_matrix_table, metrics_table, params_table};
use creditrisk_classifiers::report::{evaluation_records, write_metrics, Report, ReportSection};
use creditrisk_classifiers::tracking::{ExperimentTracker, LocalTracker, NoopTracker, RunStatus};

use crate::train::input::TrainConfig;
use crate::util::html_report_path;

/// What a finished training run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub best_params: ParamSet,
    pub best_score: f64,
    pub composite_score: f64,
    pub records: Vec<EvaluationRecord>,
}

pub fn run_training(config: &TrainConfig) -> Result<TrainingSummary> {
    let start_time = Instant::now();

    // Load and clean data
    let train_raw = read_dataset(&config.train_data)?;
    let test_raw = read_dataset(&config.test_data)?;
    train_raw.log_input_data_summary("Train");
    test_raw.log_input_data_summary("Test");

    let train = clean_data(&train_raw);
    let test = clean_data(&test_raw);
    log::info!(
        "After cleaning: {} train rows, {} test rows",
        train.nrows(),
        test.nrows()
    );

    let (x_train, y_train) = get_features_target(&train, &config.target_column)
        .with_context(|| format!("Failed to split training data: {}", config.train_data))?;
    let (x_test, y_test) = get_features_target(&test, &config.target_column)
        .with_context(|| format!("Failed to split test data: {}", config.test_data))?;

    // Test features are matched to the training features by name
    x_test
        .select_columns(&x_train.names)
        .with_context(|| format!("Test data does not match the training features: {}", config.test_data))?;

    // Grid search
    let pipeline = create_pipeline(&x_train.names, config.max_iter);
    let search = GridSearchCV::new(pipeline, config.effective_param_grid(), config.cv_folds)?.with_n_jobs(config.n_jobs);

    let local_tracker = match &config.tracking_dir {
        Some(dir) => match LocalTracker::start(dir, &config.experiment_name) {
            Ok(tracker) => {
                log::info!("Tracking run {} under {}", tracker.run_id(), dir);
                Some(tracker)
            }
            Err(e) => {
                log::warn!("Experiment tracking disabled: {:#}", e);
                None
            }
        },
        None => None,
    };
    let noop = NoopTracker;
    let tracker: &dyn ExperimentTracker = match &local_tracker {
        Some(tracker) => tracker as &dyn ExperimentTracker,
        None => &noop,
    };

    let result = search.fit(&x_train, y_train.view(), tracker);
    let status = if result.is_ok() { RunStatus::Finished } else { RunStatus::Failed };
    if let Some(tracker) = local_tracker {
        if let Err(e) = tracker.finish(status) {
            log::warn!("Failed to close tracking run: {:#}", e);
        }
    }
    let result = result.context("Grid search failed")?;
    log::info!(
        "Best params: {} (cv balanced_accuracy {:.4}, train composite {:.4})",
        format_params(&result.best_params),
        result.best_score,
        result.composite_score
    );

    // Evaluate
    let metrics = calculate_metrics(
        &result.best_estimator,
        &x_train,
        y_train.view(),
        &x_test,
        y_test.view(),
    )?;
    let confusion = calculate_confusion_matrix(
        &result.best_estimator,
        &x_train,
        y_train.view(),
        &x_test,
        y_test.view(),
    )?;
    let records = evaluation_records(metrics, confusion);

    save_model(&result.best_estimator, &config.model_output)?;
    write_metrics(&config.metrics_output, &records)?;

    if config.report_html {
        write_html_summary(config, &result, &records, start_time)?;
    }

    log::info!("Training run completed in {:.2?}", start_time.elapsed());

    Ok(TrainingSummary {
        best_params: result.best_params,
        best_score: result.best_score,
        composite_score: result.composite_score,
        records,
    })
}

fn write_html_summary(
    config: &TrainConfig,
    result: &GridSearchResult,
    records: &[EvaluationRecord],
    start_time: Instant,
) -> Result<()> {
    let mut report = Report::new(
        "Credit default classifier",
        &format!(
            "Training run of {} ({:.1?})",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            start_time.elapsed()
        ),
    );

    /* Section 1: Search */
    {
        let mut section = ReportSection::new("Grid search");
        section.add_content(html! {
            p {
                (format!(
                    "{} candidates x {} folds. Best cross-validated balanced accuracy: {:.4}. Train composite score: {:.4}.",
                    result.cv_results.len(),
                    config.cv_folds,
                    result.best_score,
                    result.composite_score
                ))
            }
        });
        section.add_content(params_table(&result.best_params));
        report.add_section(section);
    }

    /* Section 2: Metrics */
    {
        let mut section = ReportSection::new("Metrics");
        let mut metric_rows = Vec::new();
        let mut matrices = Vec::new();
        for record in records {
            match record {
                EvaluationRecord::Metrics(m) => metric_rows.push(m.clone()),
                EvaluationRecord::ConfusionMatrix(cm) => matrices.push(cm.clone()),
            }
        }
        section.add_content(metrics_table(&metric_rows));
        for cm in &matrices {
            section.add_content(confusion_matrix_table(cm));
        }
        report.add_section(section);
    }

    /* Section 3: Configuration */
    {
        let mut section = ReportSection::new("Configuration");
        let config_json = serde_json::to_string_pretty(config)?;
        section.add_content(html! {
            pre {
                code { (config_json) }
            }
        });
        report.add_section(section);
    }

    report.save_to_file(html_report_path(&config.metrics_output))
}
