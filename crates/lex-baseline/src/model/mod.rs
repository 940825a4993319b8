//! Classifier and the conversions that feed it.
//!
//! The preprocessing pipeline produces a polars frame of numeric features;
//! the classifier trains on a dense row-major [`ndarray::Array2`] built from
//! it with [`feature_matrix`], and on string class labels read with
//! [`class_labels`].

pub mod logistic;

pub use logistic::{FittedLogistic, LogisticRegression};

use crate::error::{PipelineError, Result};
use crate::utils::{f64_values, string_values};
use ndarray::Array2;
use polars::prelude::*;

/// Dense `n_rows x width` matrix of a numeric frame.
///
/// `n_rows` is passed explicitly because a frame without columns reports a
/// height of zero. Nulls and non-finite values are rejected.
pub fn feature_matrix(df: &DataFrame, n_rows: usize) -> Result<Array2<f64>> {
    if df.width() > 0 && df.height() != n_rows {
        return Err(PipelineError::InvalidData(format!(
            "feature frame has {} rows, expected {}",
            df.height(),
            n_rows
        )));
    }

    let mut matrix = Array2::zeros((n_rows, df.width()));
    for (j, col) in df.get_columns().iter().enumerate() {
        for (i, value) in f64_values(col.as_materialized_series())?
            .into_iter()
            .enumerate()
        {
            match value {
                Some(x) if x.is_finite() => matrix[[i, j]] = x,
                _ => {
                    return Err(PipelineError::InvalidData(format!(
                        "feature '{}' has a null or non-finite value at row {}",
                        col.name(),
                        i
                    )));
                }
            }
        }
    }

    Ok(matrix)
}

/// Labels as strings, one per row. Null labels are rejected.
pub fn class_labels(labels: &Series) -> Result<Vec<String>> {
    string_values(labels)?
        .into_iter()
        .enumerate()
        .map(|(row, label)| {
            label.ok_or_else(|| {
                PipelineError::InvalidData(format!(
                    "label '{}' is null at row {}",
                    labels.name(),
                    row
                ))
            })
        })
        .collect()
}
