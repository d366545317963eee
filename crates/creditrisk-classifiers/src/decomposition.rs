//! Principal Component Analysis.
//!
//! Linear projection onto the directions of maximal variance. The top
//! eigenvectors of the covariance matrix are extracted with power iteration
//! and deflation, re-orthogonalized against the components already found.
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const MAX_ITER: usize = 1000;
const TOL: f64 = 1e-10;
const INIT_SEED: u64 = 42;

/// A fitted PCA projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    /// Per-feature training mean.
    pub mean: Array1<f64>,
    /// Principal axes, shape (n_components, n_features).
    pub components: Array2<f64>,
    /// Variance explained by each component.
    pub explained_variance: Array1<f64>,
    /// Fraction of the total variance explained by each component.
    pub explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fit on `x`. `n_components = None` keeps `min(n_samples, n_features)`.
    pub fn fit(x: ArrayView2<f64>, n_components: Option<usize>) -> Result<Self, PipelineError> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(PipelineError::InvalidParameter(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d == 0 {
            return Err(PipelineError::InvalidParameter(
                "PCA requires at least 1 feature".to_string(),
            ));
        }

        let max_components = n.min(d);
        let k = match n_components {
            None => max_components,
            Some(0) => {
                return Err(PipelineError::InvalidParameter(
                    "n_components must be at least 1".to_string(),
                ))
            }
            Some(k) if k > max_components => {
                return Err(PipelineError::InvalidParameter(format!(
                    "n_components={} must be <= min(n_samples, n_features)={}",
                    k, max_components
                )))
            }
            Some(k) => k,
        };

        // Step 1: center the data
        let mean = x.mean_axis(Axis(0)).ok_or(PipelineError::EmptyInput("pca"))?;
        let centered = &x - &mean;

        // Step 2: covariance matrix (d x d)
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance: f64 = cov.diag().sum().max(1e-12);

        // Step 3: top-k eigenvectors via power iteration with deflation
        let (eigenvalues, components) = power_iteration(&cov, k);
        let explained_variance_ratio = eigenvalues.mapv(|ev| (ev / total_variance).max(0.0));

        Ok(Pca {
            mean,
            components,
            explained_variance: eigenvalues,
            explained_variance_ratio,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Project `x` onto the fitted components.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        let centered = &x - &self.mean;
        Ok(centered.dot(&self.components.t()))
    }
}

fn power_iteration(cov: &Array2<f64>, k: usize) -> (Array1<f64>, Array2<f64>) {
    let d = cov.nrows();
    let mut work = cov.clone();
    let mut eigenvalues = Array1::zeros(k);
    let mut components = Array2::zeros((k, d));
    let mut rng = StdRng::seed_from_u64(INIT_SEED);

    for c in 0..k {
        let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        orthogonalize(&mut v, &components, c);
        normalize(&mut v);

        let mut eigenvalue = 0.0;
        for _ in 0..MAX_ITER {
            let mut w = work.dot(&v);
            orthogonalize(&mut w, &components, c);
            let w_norm = w.dot(&w).sqrt();
            if w_norm < 1e-12 {
                // Remaining spectrum is null; any orthonormal direction will do.
                eigenvalue = 0.0;
                break;
            }
            let new_v = w / w_norm;
            let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();
            eigenvalue = new_v.dot(&work.dot(&new_v));
            v = new_v;
            if diff < TOL {
                break;
            }
        }

        // Deterministic sign: largest absolute loading is positive.
        let pivot = v
            .iter()
            .cloned()
            .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }

        let eigenvalue = eigenvalue.max(0.0);
        eigenvalues[c] = eigenvalue;
        components.row_mut(c).assign(&v);

        // Deflate: A = A - eigenvalue * v * v^T
        for i in 0..d {
            for j in 0..d {
                work[(i, j)] -= eigenvalue * v[i] * v[j];
            }
        }
    }

    (eigenvalues, components)
}

fn orthogonalize(v: &mut Array1<f64>, basis: &Array2<f64>, n_found: usize) {
    for row in basis.axis_iter(Axis(0)).take(n_found) {
        let proj = v.dot(&row);
        v.scaled_add(-proj, &row);
    }
}

fn normalize(v: &mut Array1<f64>) {
    let norm = v.dot(&*v).sqrt().max(1e-12);
    v.mapv_inplace(|x| x / norm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_linear_data_has_one_dominant_component() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let pca = Pca::fit(x.view(), None).unwrap();
        assert_eq!(pca.n_components(), 2);
        assert!(pca.explained_variance_ratio[0] > 0.999);

        // First axis is (1, 2) / sqrt(5) with a positive sign
        let expected = array![1.0, 2.0] / 5f64.sqrt();
        for (a, b) in pca.components.row(0).iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pca_components_are_orthonormal() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.5],
            [2.2, 2.9, 0.1],
            [1.9, 2.2, 0.9],
            [3.1, 3.0, 0.3],
            [2.3, 2.7, 1.1],
            [2.0, 1.6, 0.4],
        ];
        let pca = Pca::fit(x.view(), Some(3)).unwrap();
        let gram = pca.components.dot(&pca.components.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[(i, j)] - expected).abs() < 1e-6, "gram[{},{}] = {}", i, j, gram[(i, j)]);
            }
        }
        assert!(pca.explained_variance[0] >= pca.explained_variance[1]);
        assert!(pca.explained_variance[1] >= pca.explained_variance[2]);
    }

    #[test]
    fn test_pca_transform_projects_training_mean_to_origin() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
        let pca = Pca::fit(x.view(), Some(1)).unwrap();
        let mean = pca.mean.clone().insert_axis(Axis(0));
        let t = pca.transform(mean.view()).unwrap();
        assert_eq!(t.dim(), (1, 1));
        assert!(t[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn test_pca_rejects_too_many_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
        assert!(Pca::fit(x.view(), Some(3)).is_err());
    }
}
