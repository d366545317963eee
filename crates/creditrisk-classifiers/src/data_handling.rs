//! Tabular datasets and the cleaning/splitting steps applied before training.
//!
//! A `Dataset` is a dense numeric table with named columns. Cleaning and
//! splitting never mutate their input; they return new values so the train
//! and test sets can be processed independently with identical rules.
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::PipelineError;

/// Name of the target column in the raw input files.
pub const RAW_TARGET_COLUMN: &str = "default payment next month";
/// Canonical name of the target column after cleaning.
pub const TARGET_COLUMN: &str = "default";
pub const ID_COLUMN: &str = "ID";
pub const SEX_COLUMN: &str = "SEX";
pub const EDUCATION_COLUMN: &str = "EDUCATION";
pub const MARRIAGE_COLUMN: &str = "MARRIAGE";
/// Categorical attributes, in encoding order.
pub const CATEGORICAL_COLUMNS: [&str; 3] = [SEX_COLUMN, EDUCATION_COLUMN, MARRIAGE_COLUMN];
/// EDUCATION code for "others"; higher codes are folded into it.
pub const EDUCATION_OTHERS: f64 = 4.0;
/// Code used by EDUCATION and MARRIAGE for "not available".
pub const NOT_AVAILABLE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self, PipelineError> {
        if columns.len() != values.ncols() {
            return Err(PipelineError::ShapeMismatch {
                expected: columns.len(),
                found: values.ncols(),
            });
        }
        Ok(Dataset { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>, PipelineError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        Ok(self.values.column(idx))
    }

    /// Return a copy with `from` renamed to `to`. Absent columns are left alone.
    pub fn rename_column(&self, from: &str, to: &str) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| if c == from { to.to_string() } else { c.clone() })
            .collect();
        Dataset {
            columns,
            values: self.values.clone(),
        }
    }

    /// Return a copy without `name`. Absent columns are left alone.
    pub fn drop_column(&self, name: &str) -> Dataset {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| self.columns[i] != name)
            .collect();
        Dataset {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        }
    }

    /// Keep the rows where `mask[i]` is true, preserving their order.
    pub fn filter(&self, mask: &[bool]) -> Dataset {
        let selected_indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect();
        Dataset {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), &selected_indices),
        }
    }

    pub fn log_input_data_summary(&self, label: &str) {
        let missing = self.values.iter().filter(|v| v.is_nan()).count();
        log::info!(
            "{} dataset: {} rows x {} columns ({} missing cells)",
            label,
            self.nrows(),
            self.ncols(),
            missing
        );
    }
}

/// Explanatory attributes with their column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub x: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, x: Array2<f64>) -> Result<Self, PipelineError> {
        if names.len() != x.ncols() {
            return Err(PipelineError::ShapeMismatch {
                expected: names.len(),
                found: x.ncols(),
            });
        }
        Ok(FeatureMatrix { names, x })
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|c| c == name)
    }

    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            x: self.x.select(Axis(0), indices),
        }
    }

    /// Reorder/subset columns by name.
    pub fn select_columns(&self, names: &[String]) -> Result<FeatureMatrix, PipelineError> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .column_index(name)
                .ok_or_else(|| PipelineError::MissingColumn(name.clone()))?;
            indices.push(idx);
        }
        Ok(FeatureMatrix {
            names: names.to_vec(),
            x: self.x.select(Axis(1), &indices),
        })
    }
}

/// Clean a raw credit-card dataset.
///
/// - renames the target column to [`TARGET_COLUMN`]
/// - drops the [`ID_COLUMN`]
/// - drops rows with a missing value, where a zero EDUCATION or MARRIAGE code
///   also counts as missing
/// - folds EDUCATION codes above [`EDUCATION_OTHERS`] into that code
///
/// Applying it to an already cleaned dataset returns an equal dataset.
pub fn clean_data(data: &Dataset) -> Dataset {
    let df = data
        .rename_column(RAW_TARGET_COLUMN, TARGET_COLUMN)
        .drop_column(ID_COLUMN);

    let education_idx = df.column_index(EDUCATION_COLUMN);
    let marriage_idx = df.column_index(MARRIAGE_COLUMN);

    let mask: Vec<bool> = df
        .values
        .axis_iter(Axis(0))
        .map(|row| {
            let has_nan = row.iter().any(|v| v.is_nan());
            let is_na = |idx: Option<usize>| idx.map_or(false, |i| row[i] == NOT_AVAILABLE);
            !(has_nan || is_na(education_idx) || is_na(marriage_idx))
        })
        .collect();

    let mut cleaned = df.filter(&mask);
    if let Some(idx) = education_idx {
        cleaned
            .values
            .column_mut(idx)
            .mapv_inplace(|v| if v > EDUCATION_OTHERS { EDUCATION_OTHERS } else { v });
    }

    log::debug!(
        "Cleaning kept {} of {} rows ({} dropped)",
        cleaned.nrows(),
        data.nrows(),
        data.nrows() - cleaned.nrows()
    );

    cleaned
}

/// Split a cleaned dataset into features and a 0/1 label vector.
pub fn get_features_target(
    data: &Dataset,
    target_column: &str,
) -> Result<(FeatureMatrix, Array1<u8>), PipelineError> {
    let target_idx = data
        .column_index(target_column)
        .ok_or_else(|| PipelineError::MissingColumn(target_column.to_string()))?;

    let mut labels = Vec::with_capacity(data.nrows());
    for (row, &value) in data.values.column(target_idx).iter().enumerate() {
        let label = if value == 0.0 {
            0u8
        } else if value == 1.0 {
            1u8
        } else {
            return Err(PipelineError::InvalidLabel { row, value });
        };
        labels.push(label);
    }

    let x = data.drop_column(target_column);
    let features = FeatureMatrix {
        names: x.columns,
        x: x.values,
    };

    Ok((features, Array1::from_vec(labels)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn raw() -> Dataset {
        Dataset::new(
            vec![
                "ID".to_string(),
                "EDUCATION".to_string(),
                "MARRIAGE".to_string(),
                "default payment next month".to_string(),
            ],
            array![
                [1.0, 2.0, 1.0, 0.0],
                [2.0, 0.0, 1.0, 1.0],
                [3.0, 7.0, 2.0, 1.0],
                [4.0, 1.0, 0.0, 0.0],
                [5.0, 3.0, f64::NAN, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rename_and_drop_are_noops_for_absent_columns() {
        // NaN cells never compare equal
        let data = raw().filter(&[true, true, true, true, false]);
        assert_eq!(data.rename_column("nope", "other"), data);
        assert_eq!(data.drop_column("nope"), data);
    }

    #[test]
    fn clean_data_applies_all_rules() {
        let cleaned = clean_data(&raw());
        assert_eq!(cleaned.columns(), &["EDUCATION", "MARRIAGE", "default"]);
        assert_eq!(cleaned.values(), &array![[2.0, 1.0, 0.0], [4.0, 2.0, 1.0]]);
    }

    #[test]
    fn split_rejects_non_binary_labels() {
        let data = Dataset::new(vec!["a".to_string(), "default".to_string()], array![[1.0, 2.0]]).unwrap();
        let err = get_features_target(&data, "default").unwrap_err();
        assert_eq!(err, PipelineError::InvalidLabel { row: 0, value: 2.0 });
    }
}
