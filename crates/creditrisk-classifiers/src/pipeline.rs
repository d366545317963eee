//! Named, ordered transformation + model pipeline.
//!
//! A [`Pipeline`] is only a declaration: a list of named steps, each holding
//! one or more tagged [`Stage`]s. Fitting it produces a [`FittedPipeline`]
//! that owns every learned statistic and can be persisted as a whole.
//!
//! Stages that work on named columns (`Encode`, `Scale`) pass every other
//! column through, so the `preprocessor` step behaves as a column
//! transformer: encoded indicator columns first, then the scaled remainder.
use ndarray::{concatenate, Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{MlpConfig, ParamSet, ParamValue};
use crate::data_handling::{FeatureMatrix, CATEGORICAL_COLUMNS};
use crate::decomposition::Pca;
use crate::error::PipelineError;
use crate::feature_selection::univariate_selection::{KSelection, SelectKBest};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::mlp::MLPClassifier;
use crate::preprocessing::{fit_scaler, OneHotEncoder, StandardScaler};

pub const PREPROCESSOR_STEP: &str = "preprocessor";
pub const SELECT_K_BEST_STEP: &str = "select_k_best";
pub const PCA_STEP: &str = "pca";
pub const MODEL_STEP: &str = "model";

/// Default iteration cap of the MLP built by [`create_pipeline`].
pub const DEFAULT_MAX_ITER: usize = 15000;

/// An unfitted pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// One-hot encode the named columns.
    Encode { columns: Vec<String> },
    /// Standardize the named columns.
    Scale { columns: Vec<String> },
    /// Keep the `k` best columns by ANOVA F-score.
    SelectK { k: KSelection },
    /// Project onto principal components.
    Project { n_components: Option<usize> },
    /// Terminal classifier.
    Classify(MlpConfig),
}

impl Stage {
    fn kind(&self) -> &'static str {
        match self {
            Stage::Encode { .. } => "encode",
            Stage::Scale { .. } => "scale",
            Stage::SelectK { .. } => "select_k",
            Stage::Project { .. } => "project",
            Stage::Classify(_) => "classify",
        }
    }

    /// Apply one hyper-parameter. Returns `Ok(false)` if the stage has no
    /// parameter of that name.
    fn set_param(&mut self, param: &str, value: &ParamValue) -> Result<bool, PipelineError> {
        match self {
            Stage::SelectK { k } if param == "k" => {
                *k = match value {
                    ParamValue::Text(s) if s == "all" => KSelection::All,
                    other => KSelection::K(expect_usize(param, other)?),
                };
                Ok(true)
            }
            Stage::Project { n_components } if param == "n_components" => {
                *n_components = match value {
                    ParamValue::Null => None,
                    other => Some(expect_usize(param, other)?),
                };
                Ok(true)
            }
            Stage::Classify(config) => set_mlp_param(config, param, value),
            _ => Ok(false),
        }
    }

    fn fit(&self, data: &FeatureMatrix, y: ArrayView1<u8>) -> Result<FittedStage, PipelineError> {
        let fitted = match self {
            Stage::Encode { columns } => {
                let subset = data.select_columns(columns)?;
                FittedStage::Encode {
                    columns: columns.clone(),
                    encoder: OneHotEncoder::fit(subset.x.view())?,
                }
            }
            Stage::Scale { columns } => {
                let subset = data.select_columns(columns)?;
                FittedStage::Scale {
                    columns: columns.clone(),
                    scaler: fit_scaler(subset.x.view())?,
                }
            }
            Stage::SelectK { k } => {
                let mut selector = SelectKBest::new(*k);
                selector.fit(data.x.view(), y)?;
                FittedStage::SelectK(selector)
            }
            Stage::Project { n_components } => FittedStage::Project(Pca::fit(data.x.view(), *n_components)?),
            Stage::Classify(config) => {
                let mut model = MLPClassifier::new(config.clone());
                model.fit(data.x.view(), y)?;
                FittedStage::Classify(model)
            }
        };
        Ok(fitted)
    }
}

fn expect_usize(param: &str, value: &ParamValue) -> Result<usize, PipelineError> {
    value.as_usize().ok_or_else(|| {
        PipelineError::InvalidParameter(format!("{} expects a non-negative integer, got {}", param, value))
    })
}

fn expect_f64(param: &str, value: &ParamValue) -> Result<f64, PipelineError> {
    value
        .as_f64()
        .ok_or_else(|| PipelineError::InvalidParameter(format!("{} expects a number, got {}", param, value)))
}

fn expect_str<'a>(param: &str, value: &'a ParamValue) -> Result<&'a str, PipelineError> {
    value
        .as_str()
        .ok_or_else(|| PipelineError::InvalidParameter(format!("{} expects a string, got {}", param, value)))
}

fn set_mlp_param(config: &mut MlpConfig, param: &str, value: &ParamValue) -> Result<bool, PipelineError> {
    match param {
        "hidden_layer_sizes" => {
            config.hidden_layer_sizes = match value {
                ParamValue::Layers(layers) => layers.clone(),
                other => vec![expect_usize(param, other)?],
            }
        }
        "activation" => config.activation = expect_str(param, value)?.parse()?,
        "solver" => config.solver = expect_str(param, value)?.parse()?,
        "alpha" => config.alpha = expect_f64(param, value)?,
        "learning_rate_init" => config.learning_rate_init = expect_f64(param, value)?,
        "max_iter" => config.max_iter = expect_usize(param, value)?,
        "tol" => config.tol = expect_f64(param, value)?,
        "n_iter_no_change" => config.n_iter_no_change = expect_usize(param, value)?,
        "momentum" => config.momentum = expect_f64(param, value)?,
        "batch_size" => {
            config.batch_size = match value {
                ParamValue::Null => None,
                ParamValue::Text(s) if s == "auto" => None,
                other => Some(expect_usize(param, other)?),
            }
        }
        "random_state" => {
            config.random_state = match value {
                ParamValue::Null => None,
                other => Some(expect_usize(param, other)? as u64),
            }
        }
        _ => return Ok(false),
    }
    config.validate()?;
    Ok(true)
}

/// A named step holding one or more stages applied in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    pub name: String,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Pipeline { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Return a copy with `<step>__<param>` hyper-parameters applied.
    pub fn set_params(&self, params: &ParamSet) -> Result<Pipeline, PipelineError> {
        let mut pipeline = self.clone();
        for (key, value) in params {
            let (step_name, param) = key.split_once("__").ok_or_else(|| {
                PipelineError::InvalidParameter(format!("'{}' must look like <step>__<param>", key))
            })?;
            let step = pipeline
                .steps
                .iter_mut()
                .find(|s| s.name == step_name)
                .ok_or_else(|| PipelineError::InvalidParameter(format!("Unknown pipeline step '{}'", step_name)))?;

            let mut applied = false;
            for stage in step.stages.iter_mut() {
                if stage.set_param(param, value)? {
                    applied = true;
                    break;
                }
            }
            if !applied {
                return Err(PipelineError::InvalidParameter(format!(
                    "Step '{}' has no parameter '{}'",
                    step_name, param
                )));
            }
        }
        Ok(pipeline)
    }

    /// Fit every stage on `x`/`y` in order.
    pub fn fit(&self, x: &FeatureMatrix, y: ArrayView1<u8>) -> Result<FittedPipeline, PipelineError> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }

        let mut current = x.clone();
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut stages = Vec::with_capacity(step.stages.len());
            for stage in &step.stages {
                log::trace!("Fitting {} stage of step '{}' on {:?}", stage.kind(), step.name, current.x.dim());
                let fitted = stage.fit(&current, y)?;
                if !matches!(fitted, FittedStage::Classify(_)) {
                    current = fitted.transform(&current)?;
                }
                stages.push(fitted);
            }
            steps.push(FittedStep {
                name: step.name.clone(),
                stages,
            });
        }

        Ok(FittedPipeline {
            input_columns: x.names.clone(),
            steps,
        })
    }
}

/// Build the unfitted credit-default pipeline for the given feature columns.
///
/// Steps: `preprocessor` (one-hot SEX/EDUCATION/MARRIAGE, standardize the
/// rest), `select_k_best` (k = 10), `pca` (all components), `model` (MLP).
pub fn create_pipeline(feature_names: &[String], max_iter: usize) -> Pipeline {
    let categorical: Vec<String> = CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
    let numerical: Vec<String> = feature_names
        .iter()
        .filter(|name| !categorical.contains(*name))
        .cloned()
        .collect();

    Pipeline::new(vec![
        PipelineStep {
            name: PREPROCESSOR_STEP.to_string(),
            stages: vec![
                Stage::Encode { columns: categorical },
                Stage::Scale { columns: numerical },
            ],
        },
        PipelineStep {
            name: SELECT_K_BEST_STEP.to_string(),
            stages: vec![Stage::SelectK { k: KSelection::default() }],
        },
        PipelineStep {
            name: PCA_STEP.to_string(),
            stages: vec![Stage::Project { n_components: None }],
        },
        PipelineStep {
            name: MODEL_STEP.to_string(),
            stages: vec![Stage::Classify(MlpConfig {
                max_iter,
                ..MlpConfig::default()
            })],
        },
    ])
}

/// A stage with its learned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStage {
    Encode { columns: Vec<String>, encoder: OneHotEncoder },
    Scale { columns: Vec<String>, scaler: StandardScaler },
    SelectK(SelectKBest),
    Project(Pca),
    Classify(MLPClassifier),
}

impl FittedStage {
    fn transform(&self, data: &FeatureMatrix) -> Result<FeatureMatrix, PipelineError> {
        match self {
            FittedStage::Encode { columns, encoder } => {
                let encoded = encoder.transform(data.select_columns(columns)?.x.view())?;
                let passthrough: Vec<String> = data.names.iter().filter(|n| !columns.contains(*n)).cloned().collect();
                let rest = data.select_columns(&passthrough)?;

                let x = concatenate(Axis(1), &[encoded.view(), rest.x.view()])
                    .map_err(|e| PipelineError::InvalidParameter(format!("one-hot concatenation failed: {}", e)))?;
                let mut names = encoder.feature_names(columns);
                names.extend(passthrough);
                FeatureMatrix::new(names, x)
            }
            FittedStage::Scale { columns, scaler } => {
                let scaled = scaler.transform(data.select_columns(columns)?.x.view())?;
                let mut out = data.clone();
                for (j, name) in columns.iter().enumerate() {
                    let idx = data
                        .column_index(name)
                        .ok_or_else(|| PipelineError::MissingColumn(name.clone()))?;
                    out.x.column_mut(idx).assign(&scaled.column(j));
                }
                Ok(out)
            }
            FittedStage::SelectK(selector) => {
                let names: Vec<String> = selector
                    .support()?
                    .iter()
                    .map(|&i| {
                        data.names.get(i).cloned().ok_or(PipelineError::ShapeMismatch {
                            expected: i + 1,
                            found: data.ncols(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                data.select_columns(&names)
            }
            FittedStage::Project(pca) => {
                let x = pca.transform(data.x.view())?;
                let names = (0..pca.n_components()).map(|i| format!("pca{}", i)).collect();
                FeatureMatrix::new(names, x)
            }
            FittedStage::Classify(_) => Ok(data.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStep {
    pub name: String,
    pub stages: Vec<FittedStage>,
}

/// A fitted pipeline, the unit that gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    input_columns: Vec<String>,
    steps: Vec<FittedStep>,
}

impl FittedPipeline {
    /// Feature columns seen during fit, in order.
    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn classifier(&self) -> Option<&MLPClassifier> {
        self.steps.iter().flat_map(|s| s.stages.iter()).find_map(|stage| match stage {
            FittedStage::Classify(model) => Some(model),
            _ => None,
        })
    }

    /// Run every non-terminal stage. Input columns are matched by name.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix, PipelineError> {
        let mut current = x.select_columns(&self.input_columns)?;
        for stage in self.steps.iter().flat_map(|s| s.stages.iter()) {
            current = stage.transform(&current)?;
        }
        Ok(current)
    }

    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Array1<f64>, PipelineError> {
        let model = self.classifier().ok_or(PipelineError::NotFitted("model"))?;
        let transformed = self.transform(x)?;
        model.predict_proba(transformed.x.view())
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array1<u8>, PipelineError> {
        let model = self.classifier().ok_or(PipelineError::NotFitted("model"))?;
        let transformed = self.transform(x)?;
        model.predict(transformed.x.view())
    }
}
