use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Hidden-layer activation of the MLP classifier.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Logistic,
    Tanh,
    Relu,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Relu
    }
}

impl FromStr for Activation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" => Ok(Activation::Identity),
            "logistic" => Ok(Activation::Logistic),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            _ => Err(PipelineError::InvalidParameter(format!(
                "Unknown activation: {}. Expected one of identity, logistic, tanh, relu",
                s
            ))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Activation::Identity => "identity",
            Activation::Logistic => "logistic",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
        };
        f.write_str(name)
    }
}

/// Weight optimization strategy of the MLP classifier.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    Adam,
    Sgd,
}

impl Default for Solver {
    fn default() -> Self {
        Solver::Adam
    }
}

impl FromStr for Solver {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adam" => Ok(Solver::Adam),
            "sgd" => Ok(Solver::Sgd),
            _ => Err(PipelineError::InvalidParameter(format!(
                "Unknown solver: {}. Expected adam or sgd",
                s
            ))),
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Solver::Adam => f.write_str("adam"),
            Solver::Sgd => f.write_str("sgd"),
        }
    }
}

/// Hyper-parameters of the multi-layer perceptron.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden_layer_sizes: Vec<usize>,
    pub activation: Activation,
    pub solver: Solver,
    /// L2 penalty strength.
    pub alpha: f64,
    /// Mini-batch size; `None` uses `min(200, n_samples)`.
    pub batch_size: Option<usize>,
    pub learning_rate_init: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
    /// Only used by the sgd solver.
    pub momentum: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            solver: Solver::Adam,
            alpha: 1e-4,
            batch_size: None,
            learning_rate_init: 1e-3,
            max_iter: 200,
            tol: 1e-4,
            n_iter_no_change: 10,
            shuffle: true,
            random_state: None,
            momentum: 0.9,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl MlpConfig {
    pub fn new(hidden_layer_sizes: Vec<usize>, max_iter: usize) -> Self {
        Self {
            hidden_layer_sizes,
            max_iter,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.hidden_layer_sizes.iter().any(|&n| n == 0) {
            return Err(PipelineError::InvalidParameter(
                "hidden_layer_sizes must all be positive".to_string(),
            ));
        }
        if !(self.alpha >= 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        if !(self.learning_rate_init > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "learning_rate_init must be positive, got {}",
                self.learning_rate_init
            )));
        }
        if self.max_iter == 0 {
            return Err(PipelineError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(PipelineError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single hyper-parameter value as it appears in a search grid.
///
/// Grids are declared in JSON, so the variants follow the JSON shapes:
/// `20`, `0.353`, `"relu"`, `[35, 35, 30]` and `null`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    Layers(Vec<usize>),
    Null,
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Layers(layers) => {
                let parts: Vec<String> = layers.iter().map(|n| n.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            ParamValue::Null => f.write_str("None"),
        }
    }
}

/// One point of a parameter grid, keyed `<step>__<param>`.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Exhaustive hyper-parameter grid, expanded in sorted key order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ParameterGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, values: Vec<ParamValue>) -> Self {
        self.params.insert(key.to_string(), values);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of combinations the grid expands to.
    pub fn len(&self) -> usize {
        self.params.values().map(|v| v.len()).product()
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (key, values) in &self.params {
            if values.is_empty() {
                return Err(PipelineError::InvalidParameter(format!(
                    "Parameter grid entry '{}' has no values",
                    key
                )));
            }
            if !key.contains("__") {
                return Err(PipelineError::InvalidParameter(format!(
                    "Parameter grid key '{}' must look like <step>__<param>",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Expand the grid into its cartesian product. The last key varies fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
        for (key, values) in &self.params {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut extended = combo.clone();
                    extended.insert(key.clone(), value.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }
        combos
    }
}

/// The grid the production run searches over.
pub fn default_param_grid() -> ParameterGrid {
    ParameterGrid::new()
        .with("pca__n_components", vec![ParamValue::Int(20)])
        .with("select_k_best__k", vec![ParamValue::Int(20)])
        .with(
            "model__hidden_layer_sizes",
            vec![ParamValue::Layers(vec![35, 35, 30, 30, 30, 30, 30, 30])],
        )
        .with("model__activation", vec![ParamValue::Text("relu".to_string())])
        .with("model__solver", vec![ParamValue::Text("adam".to_string())])
        .with("model__alpha", vec![ParamValue::Float(0.353)])
        .with("model__learning_rate_init", vec![ParamValue::Float(0.0005)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_expands_cartesian_product_in_key_order() {
        let grid = ParameterGrid::new()
            .with("model__alpha", vec![ParamValue::Float(0.1), ParamValue::Float(1.0)])
            .with("pca__n_components", vec![ParamValue::Int(2), ParamValue::Int(3), ParamValue::Null]);

        let combos = grid.combinations();
        assert_eq!(grid.len(), 6);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0]["model__alpha"], ParamValue::Float(0.1));
        assert_eq!(combos[0]["pca__n_components"], ParamValue::Int(2));
        assert_eq!(combos[2]["pca__n_components"], ParamValue::Null);
        assert_eq!(combos[3]["model__alpha"], ParamValue::Float(1.0));
    }

    #[test]
    fn grid_parses_json_shapes() {
        let json = r#"{"model__hidden_layer_sizes": [[35, 30]], "model__alpha": [0.353], "select_k_best__k": [20, "all"], "pca__n_components": [null]}"#;
        let grid: ParameterGrid = serde_json::from_str(json).unwrap();
        let combos = grid.combinations();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0]["model__hidden_layer_sizes"], ParamValue::Layers(vec![35, 30]));
        assert_eq!(combos[0]["select_k_best__k"], ParamValue::Int(20));
        assert_eq!(combos[1]["select_k_best__k"], ParamValue::Text("all".to_string()));
        assert_eq!(combos[0]["pca__n_components"], ParamValue::Null);
    }

    #[test]
    fn grid_rejects_empty_values_and_bad_keys() {
        let empty = ParameterGrid::new().with("model__alpha", vec![]);
        assert!(empty.validate().is_err());
        let bad_key = ParameterGrid::new().with("alpha", vec![ParamValue::Float(1.0)]);
        assert!(bad_key.validate().is_err());
        assert!(default_param_grid().validate().is_ok());
    }

    #[test]
    fn activation_and_solver_from_str() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("sgd".parse::<Solver>().unwrap(), Solver::Sgd);
        assert!("lbfgs".parse::<Solver>().is_err());
        assert!("softmax".parse::<Activation>().is_err());
    }
}
