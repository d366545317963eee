//! Multi-layer perceptron for binary classification.
//!
//! A feedforward network with configurable hidden layers, a single logistic
//! output unit and binary cross-entropy loss with an L2 penalty. Weights are
//! trained with mini-batch Adam or SGD with momentum until the training loss
//! stops improving by more than `tol` for `n_iter_no_change` epochs, or
//! `max_iter` epochs have run.

use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{Activation, MlpConfig, Solver};
use crate::error::PipelineError;
use crate::models::classifier_trait::ClassifierModel;

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MlpConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    n_iter: usize,
    loss_curve: Vec<f64>,
    is_fitted: bool,
}

impl MLPClassifier {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_iter: 0,
            loss_curve: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Number of epochs run by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Training loss after each epoch of the last fit.
    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn initialize_weights(&mut self, rng: &mut StdRng) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layer_sizes);
        layer_sizes.push(1);

        // Glorot uniform initialization
        let factor = if self.config.activation == Activation::Logistic {
            2.0
        } else {
            6.0
        };

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let bound = (factor / (n_in + n_out) as f64).sqrt();
            let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound));
            let biases = Array1::from_shape_fn(n_out, |_| rng.gen_range(-bound..bound));
            self.weights.push(weights);
            self.biases.push(biases);
        }
    }

    /// Returns the activations of every layer; index 0 is the input.
    fn forward(&self, x: ArrayView2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(x.to_owned());

        let output_layer = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i == output_layer {
                z.mapv_into(sigmoid)
            } else {
                activate(z, self.config.activation)
            };
            activations.push(a);
        }

        activations
    }

    /// Loss and gradients for one mini-batch.
    fn backward(
        &self,
        activations: &[Array2<f64>],
        y: ArrayView1<f64>,
    ) -> (f64, Vec<Array2<f64>>, Vec<Array1<f64>>) {
        let n = y.len() as f64;
        let n_layers = self.weights.len();
        let output = &activations[n_layers];

        let log_loss = output
            .column(0)
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| {
                let p = p.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / n;
        let squared_weights: f64 = self
            .weights
            .iter()
            .map(|w| w.iter().map(|v| v * v).sum::<f64>())
            .sum();
        let loss = log_loss + 0.5 * self.config.alpha * squared_weights / n;

        let mut grads_w = Vec::with_capacity(n_layers);
        let mut grads_b = Vec::with_capacity(n_layers);

        // Logistic output with cross-entropy: dL/dz = p - y
        let mut delta = output - &y.insert_axis(Axis(1));

        for i in (0..n_layers).rev() {
            let a_prev = &activations[i];
            let grad_w = (a_prev.t().dot(&delta) + &(&self.weights[i] * self.config.alpha)) / n;
            let grad_b = delta.sum_axis(Axis(0)) / n;
            grads_w.push(grad_w);
            grads_b.push(grad_b);

            if i > 0 {
                delta = delta.dot(&self.weights[i].t())
                    * &activation_derivative(&activations[i], self.config.activation);
            }
        }

        grads_w.reverse();
        grads_b.reverse();
        (loss, grads_w, grads_b)
    }

    fn check_fitted(&self, x: &ArrayView2<f64>) -> Result<(), PipelineError> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("model"));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        Ok(())
    }
}

impl ClassifierModel for MLPClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<(), PipelineError> {
        self.config.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(PipelineError::EmptyInput("model"));
        }
        if y.len() != n_samples {
            return Err(PipelineError::ShapeMismatch {
                expected: n_samples,
                found: y.len(),
            });
        }
        if let Some(row) = y.iter().position(|&v| v > 1) {
            return Err(PipelineError::InvalidLabel {
                row,
                value: y[row] as f64,
            });
        }
        let positives = y.iter().filter(|&&v| v == 1).count();
        if positives == 0 || positives == n_samples {
            return Err(PipelineError::SingleClass(y[0] as usize));
        }

        self.n_features = x.ncols();
        self.is_fitted = false;
        self.loss_curve.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.initialize_weights(&mut rng);

        let y = y.mapv(f64::from);
        let batch_size = self.config.batch_size.unwrap_or(200).min(n_samples);
        let mut optimizer = Optimizer::new(&self.config, &self.weights, &self.biases);

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut best_loss = f64::INFINITY;
        let mut no_improvement_count = 0;

        for epoch in 0..self.config.max_iter {
            if self.config.shuffle {
                indices.shuffle(&mut rng);
            }

            let mut accumulated_loss = 0.0;
            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch = y.select(Axis(0), batch);

                let activations = self.forward(x_batch.view());
                let (batch_loss, grads_w, grads_b) = self.backward(&activations, y_batch.view());
                optimizer.update(&mut self.weights, &mut self.biases, &grads_w, &grads_b);

                accumulated_loss += batch_loss * batch.len() as f64;
            }

            let loss = accumulated_loss / n_samples as f64;
            self.loss_curve.push(loss);
            self.n_iter = epoch + 1;

            if !loss.is_finite() {
                return Err(PipelineError::InvalidParameter(format!(
                    "training diverged at epoch {} (loss = {})",
                    epoch + 1,
                    loss
                )));
            }

            if loss > best_loss - self.config.tol {
                no_improvement_count += 1;
            } else {
                no_improvement_count = 0;
            }
            if loss < best_loss {
                best_loss = loss;
            }
            if no_improvement_count > self.config.n_iter_no_change {
                log::trace!(
                    "MLP converged after {} epochs (loss {:.6})",
                    self.n_iter,
                    loss
                );
                break;
            }
        }

        if self.n_iter == self.config.max_iter {
            log::debug!(
                "MLP reached max_iter={} without converging",
                self.config.max_iter
            );
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PipelineError> {
        self.check_fitted(&x)?;
        let activations = self.forward(x);
        Ok(activations[self.weights.len()].column(0).to_owned())
    }

    fn name(&self) -> &str {
        "mlp"
    }
}

/// Per-parameter optimizer state. For sgd only the first moments are used,
/// as momentum velocities.
struct Optimizer {
    solver: Solver,
    learning_rate: f64,
    momentum: f64,
    beta_1: f64,
    beta_2: f64,
    epsilon: f64,
    t: i32,
    first_w: Vec<Array2<f64>>,
    second_w: Vec<Array2<f64>>,
    first_b: Vec<Array1<f64>>,
    second_b: Vec<Array1<f64>>,
}

impl Optimizer {
    fn new(config: &MlpConfig, weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Self {
        let zeros_w = || weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect::<Vec<_>>();
        let zeros_b = || biases.iter().map(|b| Array1::zeros(b.raw_dim())).collect::<Vec<_>>();
        Optimizer {
            solver: config.solver,
            learning_rate: config.learning_rate_init,
            momentum: config.momentum,
            beta_1: config.beta_1,
            beta_2: config.beta_2,
            epsilon: config.epsilon,
            t: 0,
            first_w: zeros_w(),
            second_w: zeros_w(),
            first_b: zeros_b(),
            second_b: zeros_b(),
        }
    }

    fn update(
        &mut self,
        weights: &mut [Array2<f64>],
        biases: &mut [Array1<f64>],
        grads_w: &[Array2<f64>],
        grads_b: &[Array1<f64>],
    ) {
        match self.solver {
            Solver::Adam => {
                self.t += 1;
                let lr_t = self.learning_rate * (1.0 - self.beta_2.powi(self.t)).sqrt()
                    / (1.0 - self.beta_1.powi(self.t));
                let (b1, b2, eps) = (self.beta_1, self.beta_2, self.epsilon);
                for i in 0..weights.len() {
                    adam_step(&mut weights[i], &mut self.first_w[i], &mut self.second_w[i], &grads_w[i], lr_t, b1, b2, eps);
                    adam_step(&mut biases[i], &mut self.first_b[i], &mut self.second_b[i], &grads_b[i], lr_t, b1, b2, eps);
                }
            }
            Solver::Sgd => {
                let (lr, momentum) = (self.learning_rate, self.momentum);
                for i in 0..weights.len() {
                    sgd_step(&mut weights[i], &mut self.first_w[i], &grads_w[i], lr, momentum);
                    sgd_step(&mut biases[i], &mut self.first_b[i], &grads_b[i], lr, momentum);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn adam_step<D: Dimension>(
    param: &mut Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    lr_t: f64,
    beta_1: f64,
    beta_2: f64,
    epsilon: f64,
) {
    Zip::from(param)
        .and(m)
        .and(v)
        .and(grad)
        .for_each(|p, m, v, &g| {
            *m = beta_1 * *m + (1.0 - beta_1) * g;
            *v = beta_2 * *v + (1.0 - beta_2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + epsilon);
        });
}

fn sgd_step<D: Dimension>(
    param: &mut Array<f64, D>,
    velocity: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    learning_rate: f64,
    momentum: f64,
) {
    Zip::from(param)
        .and(velocity)
        .and(grad)
        .for_each(|p, vel, &g| {
            *vel = momentum * *vel - learning_rate * g;
            *p += *vel;
        });
}

fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

fn activate(z: Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::Relu => z.mapv_into(|v| v.max(0.0)),
        Activation::Logistic => z.mapv_into(sigmoid),
        Activation::Tanh => z.mapv_into(f64::tanh),
        Activation::Identity => z,
    }
}

/// Derivative expressed through the activation output `a`.
fn activation_derivative(a: &Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
        Activation::Tanh => a.mapv(|v| 1.0 - v * v),
        Activation::Identity => Array2::ones(a.raw_dim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn separable() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [-3.0, -1.0],
            [-2.5, -0.5],
            [-2.0, -1.5],
            [-1.5, -1.0],
            [1.5, 1.0],
            [2.0, 0.5],
            [2.5, 1.5],
            [3.0, 1.0]
        ];
        let y = array![0u8, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    fn config(solver: Solver) -> MlpConfig {
        MlpConfig {
            hidden_layer_sizes: vec![8],
            solver,
            learning_rate_init: 0.05,
            max_iter: 500,
            random_state: Some(0),
            ..MlpConfig::default()
        }
    }

    #[test]
    fn test_mlp_adam_learns_separable_data() {
        let (x, y) = separable();
        let mut mlp = MLPClassifier::new(config(Solver::Adam));
        mlp.fit(x.view(), y.view()).unwrap();

        assert!(mlp.is_fitted());
        assert!(mlp.n_iter() > 0);
        assert_eq!(mlp.predict(x.view()).unwrap(), y);
        let first = mlp.loss_curve()[0];
        let last = *mlp.loss_curve().last().unwrap();
        assert!(last < first, "loss should decrease: {} -> {}", first, last);
    }

    #[test]
    fn test_mlp_sgd_learns_separable_data() {
        let (x, y) = separable();
        let mut mlp = MLPClassifier::new(config(Solver::Sgd));
        mlp.fit(x.view(), y.view()).unwrap();
        assert_eq!(mlp.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_mlp_seeded_fit_is_deterministic() {
        let (x, y) = separable();
        let mut a = MLPClassifier::new(config(Solver::Adam));
        let mut b = MLPClassifier::new(config(Solver::Adam));
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.predict_proba(x.view()).unwrap(), b.predict_proba(x.view()).unwrap());
    }

    #[test]
    fn test_mlp_rejects_single_class() {
        let (x, _) = separable();
        let y = Array1::from_elem(8, 1u8);
        let mut mlp = MLPClassifier::new(config(Solver::Adam));
        assert_eq!(mlp.fit(x.view(), y.view()).unwrap_err(), PipelineError::SingleClass(1));
    }

    #[test]
    fn test_mlp_predict_before_fit_errors() {
        let (x, _) = separable();
        let mlp = MLPClassifier::new(MlpConfig::default());
        assert_eq!(mlp.predict(x.view()).unwrap_err(), PipelineError::NotFitted("model"));
    }
}
