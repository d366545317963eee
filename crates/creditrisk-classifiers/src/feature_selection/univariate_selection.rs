//! Univariate feature selection methods following scikit-learn's API.
//!
//! See: https://scikit-learn.org/stable/modules/feature_selection.html#univariate-feature-selection

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::PipelineError;

/// Compute the one-way ANOVA F-value of each feature against a class label.
///
/// For every column the samples are grouped by class and the ratio of the
/// between-class mean square to the within-class mean square is returned,
/// together with the p-value of that statistic under an F(k-1, n-k)
/// distribution.
///
/// Non-finite statistics are forced finite: a feature that is constant
/// within every class but separates them gets `f64::MAX` (p = 0); a feature
/// that is constant overall gets 0 (p = 1).
///
/// # Parameters
///
/// * `x` - A 2D array of shape (n_samples, n_features).
/// * `y` - Class labels of shape (n_samples,).
///
/// # Returns
///
/// A tuple `(f_statistic, p_values)`, each of shape (n_features,).
pub fn f_classif(
    x: ArrayView2<f64>,
    y: ArrayView1<u8>,
) -> Result<(Array1<f64>, Array1<f64>), PipelineError> {
    let n_samples = x.nrows();
    if y.len() != n_samples {
        return Err(PipelineError::ShapeMismatch {
            expected: n_samples,
            found: y.len(),
        });
    }

    let mut groups: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    let n_classes = groups.len();
    if n_classes < 2 {
        return Err(PipelineError::SingleClass(y.iter().next().copied().unwrap_or(0) as usize));
    }
    if n_samples <= n_classes {
        return Err(PipelineError::InvalidParameter(format!(
            "f_classif needs more samples ({}) than classes ({})",
            n_samples, n_classes
        )));
    }

    let dfbn = (n_classes - 1) as f64;
    let dfwn = (n_samples - n_classes) as f64;
    let f_dist = FisherSnedecor::new(dfbn, dfwn)
        .map_err(|e| PipelineError::InvalidParameter(format!("F distribution: {}", e)))?;

    let n_features = x.ncols();
    let mut f_statistic = Array1::zeros(n_features);
    let mut p_values = Array1::zeros(n_features);

    for (j, col) in x.axis_iter(Axis(1)).enumerate() {
        let grand_mean = col.sum() / n_samples as f64;
        let mut ss_between = 0.0;
        let mut ss_within = 0.0;
        for indices in groups.values() {
            let n_c = indices.len() as f64;
            let class_mean = indices.iter().map(|&i| col[i]).sum::<f64>() / n_c;
            ss_between += n_c * (class_mean - grand_mean).powi(2);
            ss_within += indices.iter().map(|&i| (col[i] - class_mean).powi(2)).sum::<f64>();
        }

        let f = (ss_between / dfbn) / (ss_within / dfwn);
        let (f, p) = if f.is_nan() {
            (0.0, 1.0)
        } else if f.is_infinite() {
            (f64::MAX, 0.0)
        } else {
            (f, 1.0 - f_dist.cdf(f))
        };
        f_statistic[j] = f;
        p_values[j] = p;
    }

    Ok((f_statistic, p_values))
}

/// How many features `SelectKBest` keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KSelection {
    K(usize),
    All,
}

impl Default for KSelection {
    fn default() -> Self {
        KSelection::K(10)
    }
}

/// A struct for selecting the k best features based on ANOVA F-scores.
///
/// This struct implements a feature selection method similar to scikit-learn's
/// SelectKBest with f_classif as the scoring function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectKBest {
    /// The number of top features to select.
    k: KSelection,
    /// Column indices kept by the last `fit`, ascending.
    support: Option<Vec<usize>>,
    scores: Option<Vec<f64>>,
}

impl SelectKBest {
    /// Creates a new SelectKBest instance.
    ///
    /// # Arguments
    ///
    /// * `k` - The number of top features to select.
    pub fn new(k: KSelection) -> Self {
        SelectKBest {
            k,
            support: None,
            scores: None,
        }
    }

    pub fn k(&self) -> KSelection {
        self.k
    }

    /// Fits the selector and returns the indices of the k best features.
    ///
    /// Indices are returned in ascending order so the selected columns keep
    /// their original relative order. Ties are broken in favour of the later
    /// column.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<u8>) -> Result<Vec<usize>, PipelineError> {
        let n_features = x.ncols();
        let k = match self.k {
            KSelection::All => n_features,
            KSelection::K(k) if k <= n_features => k,
            KSelection::K(k) => {
                return Err(PipelineError::InvalidParameter(format!(
                    "k={} is larger than the number of features ({})",
                    k, n_features
                )))
            }
        };

        let (f_scores, _) = f_classif(x, y)?;

        // Create a vector of indices
        let mut indices: Vec<usize> = (0..f_scores.len()).collect();

        // Sort indices based on scores in ascending order using a stable sort
        indices.sort_by(|&i, &j| f_scores[i].partial_cmp(&f_scores[j]).unwrap_or(std::cmp::Ordering::Equal));

        // Select top k features by taking the last k elements
        let mut selected: Vec<usize> = indices.iter().rev().take(k).cloned().collect();
        selected.sort_unstable();

        self.scores = Some(f_scores.to_vec());
        self.support = Some(selected.clone());
        Ok(selected)
    }

    /// Indices selected by the last `fit`.
    pub fn support(&self) -> Result<&[usize], PipelineError> {
        self.support
            .as_deref()
            .ok_or(PipelineError::NotFitted("select_k_best"))
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_f_classif_matches_manual_anova() {
        // class 0: [1, 2, 3], class 1: [5, 6, 7]
        let x = Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 5.0, 6.0, 7.0]).unwrap();
        let y = Array1::from_vec(vec![0u8, 0, 0, 1, 1, 1]);
        let (f, p) = f_classif(x.view(), y.view()).unwrap();
        // grand mean 4, ss_between = 3*4 + 3*4 = 24, ss_within = 4, F = 24 / (4/4) = 24
        assert!((f[0] - 24.0).abs() < 1e-9, "F = {}", f[0]);
        assert!(p[0] > 0.0 && p[0] < 0.01, "p = {}", p[0]);
    }

    #[test]
    fn test_select_k_best() {
        // Features: [noise, perfectly separating, constant, weakly separating, noise]
        let x = Array2::from_shape_vec((10, 5), vec![
            0.1,  1.0, 5.0,  0.9, -0.3,
            0.4, -1.0, 5.0,  0.2,  0.1,
            0.6,  1.0, 5.0,  1.2,  0.2,
            0.9, -1.0, 5.0,  0.1, -0.1,
            1.2,  1.0, 5.0,  0.8,  0.3,
            1.5, -1.0, 5.0,  0.3,  0.0,
            1.8,  1.0, 5.0,  1.1, -0.2,
            2.1, -1.0, 5.0,  0.4,  0.4,
            2.4,  1.0, 5.0,  1.0, -0.1,
            2.7, -1.0, 5.0, -0.1,  0.2,
        ]).unwrap();
        let y = Array1::from_vec(vec![1u8, 0, 1, 0, 1, 0, 1, 0, 1, 0]);

        let mut selector = SelectKBest::new(KSelection::K(2));
        let selected = selector.fit(x.view(), y.view()).unwrap();

        assert_eq!(selected, vec![1, 3]);
        assert_eq!(selector.support().unwrap(), &[1, 3]);
        // The constant feature scores zero
        assert_eq!(selector.scores().unwrap()[2], 0.0);
    }

    #[test]
    fn test_select_k_best_rejects_oversized_k() {
        let x = Array2::from_shape_vec((4, 2), vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]).unwrap();
        let y = Array1::from_vec(vec![0u8, 1, 0, 1]);
        let mut selector = SelectKBest::new(KSelection::K(3));
        assert!(selector.fit(x.view(), y.view()).is_err());

        let mut all = SelectKBest::new(KSelection::All);
        assert_eq!(all.fit(x.view(), y.view()).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_f_classif_requires_two_classes() {
        let x = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let y = Array1::from_vec(vec![1u8, 1, 1]);
        assert_eq!(f_classif(x.view(), y.view()).unwrap_err(), PipelineError::SingleClass(1));
    }
}
